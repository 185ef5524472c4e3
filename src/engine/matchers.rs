//! Per-family condition predicates.
//!
//! Every matcher takes an optional condition and the visitor context and
//! returns a boolean. An absent condition imposes no constraint and
//! returns true. Malformed inputs (bad timezone, unparsable referrer or
//! version string) make the affected check fail safely; matchers never
//! return errors.

use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use std::cmp::Ordering;
use url::Url;

use super::context::VisitorContext;
use super::version;
use crate::models::{
    DeviceCondition, GeoCondition, LanguageCondition, QueryParamCondition, ReferrerCondition,
    TimeCondition,
};

/// Lowercased host of a referrer URL; `None` for empty or unparsable input.
pub fn extract_domain(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let parsed = Url::parse(raw).ok()?;
    parsed.host_str().map(|host| host.to_lowercase())
}

fn contains_ci(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Exclusions are checked before inclusions so a rule can include a whole
/// continent yet carve out specific blocked countries.
pub fn match_geo(cond: Option<&GeoCondition>, ctx: &VisitorContext) -> bool {
    let Some(cond) = cond else { return true };

    if !cond.exclude_countries.is_empty() {
        if let Some(country) = &ctx.country {
            if contains_ci(&cond.exclude_countries, country) {
                return false;
            }
        }
    }
    if !cond.exclude_regions.is_empty() {
        if let Some(region) = &ctx.region {
            if cond.exclude_regions.iter().any(|r| r == region) {
                return false;
            }
        }
    }

    // Inclusions: a non-empty list requires the context field to be known
    // and contained.
    if !cond.continents.is_empty() {
        match &ctx.continent {
            Some(continent) if contains_ci(&cond.continents, continent) => {}
            _ => return false,
        }
    }
    if !cond.countries.is_empty() {
        match &ctx.country {
            Some(country) if contains_ci(&cond.countries, country) => {}
            _ => return false,
        }
    }
    if !cond.regions.is_empty() {
        match &ctx.region {
            Some(region) if cond.regions.iter().any(|r| r == region) => {}
            _ => return false,
        }
    }
    if !cond.cities.is_empty() {
        match &ctx.city {
            Some(city) if contains_ci(&cond.cities, city) => {}
            _ => return false,
        }
    }

    true
}

pub fn match_device(cond: Option<&DeviceCondition>, ctx: &VisitorContext) -> bool {
    let Some(cond) = cond else { return true };

    if !cond.device_types.is_empty() {
        match &ctx.device_type {
            Some(device) => {
                let device = device.to_lowercase();
                if !cond.device_types.iter().any(|t| t.to_lowercase() == device) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if !cond.operating_systems.is_empty() {
        match &ctx.os {
            Some(os) if contains_ci(&cond.operating_systems, os) => {}
            _ => return false,
        }
    }
    if !cond.browsers.is_empty() {
        match &ctx.browser {
            Some(browser) if contains_ci(&cond.browsers, browser) => {}
            _ => return false,
        }
    }

    // Version bounds only constrain when the visitor's version is known;
    // an unparsable pair skips the bound.
    if let Some(os_version) = &ctx.os_version {
        if let Some(min) = &cond.min_os_version {
            if version::compare(os_version, min) == Some(Ordering::Less) {
                return false;
            }
        }
        if let Some(max) = &cond.max_os_version {
            if version::compare(os_version, max) == Some(Ordering::Greater) {
                return false;
            }
        }
    }

    true
}

pub fn match_time(cond: Option<&TimeCondition>, ctx: &VisitorContext) -> bool {
    let Some(cond) = cond else { return true };

    // Unrecognized timezone names fall back to UTC rather than failing.
    let tz: Tz = cond
        .timezone
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(chrono_tz::UTC);
    let now = ctx.timestamp.unwrap_or_else(Utc::now);
    let local = now.with_timezone(&tz);

    // YYYY-MM-DD sorts correctly, so a string comparison suffices.
    let date = local.format("%Y-%m-%d").to_string();
    if let Some(start) = &cond.start_date {
        if date.as_str() < start.as_str() {
            return false;
        }
    }
    if let Some(end) = &cond.end_date {
        if date.as_str() > end.as_str() {
            return false;
        }
    }

    let time = local.format("%H:%M").to_string();
    match (&cond.start_time, &cond.end_time) {
        (Some(start), Some(end)) if start <= end => {
            if time.as_str() < start.as_str() || time.as_str() > end.as_str() {
                return false;
            }
        }
        // Overnight wrap (e.g. 22:00-06:00): only the gap between end and
        // start is outside the window.
        (Some(start), Some(end)) => {
            if time.as_str() < start.as_str() && time.as_str() > end.as_str() {
                return false;
            }
        }
        (Some(start), None) => {
            if time.as_str() < start.as_str() {
                return false;
            }
        }
        (None, Some(end)) => {
            if time.as_str() > end.as_str() {
                return false;
            }
        }
        (None, None) => {}
    }

    if !cond.days_of_week.is_empty() {
        let weekday = local.weekday().num_days_from_sunday() as u8;
        if !cond.days_of_week.contains(&weekday) {
            return false;
        }
    }

    true
}

pub fn match_language(cond: Option<&LanguageCondition>, ctx: &VisitorContext) -> bool {
    let Some(cond) = cond else { return true };

    // "zh-CN" -> "zh"
    let primary = ctx
        .language
        .as_deref()
        .map(|lang| lang.split('-').next().unwrap_or(lang).to_lowercase());

    if !cond.exclude_languages.is_empty() {
        if let Some(primary) = &primary {
            if cond
                .exclude_languages
                .iter()
                .any(|l| l.to_lowercase() == *primary)
            {
                return false;
            }
        }
    }
    if !cond.languages.is_empty() {
        match &primary {
            Some(primary) if cond.languages.iter().any(|l| l.to_lowercase() == *primary) => {}
            _ => return false,
        }
    }

    true
}

pub fn match_referrer(cond: Option<&ReferrerCondition>, ctx: &VisitorContext) -> bool {
    let Some(cond) = cond else { return true };

    let domain = ctx
        .referrer_domain
        .as_ref()
        .map(|d| d.to_lowercase())
        .or_else(|| ctx.referrer.as_deref().and_then(extract_domain));

    if !cond.exclude_domains.is_empty() {
        if let Some(domain) = &domain {
            if cond
                .exclude_domains
                .iter()
                .any(|d| domain.contains(&d.to_lowercase()))
            {
                return false;
            }
        }
    }
    if !cond.domains.is_empty() {
        match &domain {
            Some(domain)
                if cond
                    .domains
                    .iter()
                    .any(|d| domain.contains(&d.to_lowercase())) => {}
            _ => return false,
        }
    }

    // UTM checks are exact equality, not substring.
    let utm_pairs = [
        (&cond.utm_source, &ctx.utm_source),
        (&cond.utm_medium, &ctx.utm_medium),
        (&cond.utm_campaign, &ctx.utm_campaign),
    ];
    for (expected, actual) in utm_pairs {
        if let Some(expected) = expected {
            match actual {
                Some(actual) if actual.eq_ignore_ascii_case(expected) => {}
                _ => return false,
            }
        }
    }

    true
}

/// All triples must hold. A parameter the visitor did not send is compared
/// as an empty string.
pub fn match_query_params(conds: Option<&[QueryParamCondition]>, ctx: &VisitorContext) -> bool {
    let Some(conds) = conds else { return true };

    conds.iter().all(|cond| {
        let actual = ctx
            .query_params
            .get(&cond.param)
            .map(String::as_str)
            .unwrap_or("");
        cond.op.evaluate(actual, &cond.value)
    })
}
