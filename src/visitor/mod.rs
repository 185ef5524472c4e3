//! Visitor-attribute collection at the HTTP boundary.
//!
//! Turns request headers and query parameters into a normalized
//! [`VisitorContext`]. Geo attributes are read from CDN-style headers;
//! device attributes come from lightweight user-agent sniffing.

use axum::http::HeaderMap;
use chrono::Utc;
use std::collections::HashMap;

use crate::engine::matchers::extract_domain;
use crate::engine::VisitorContext;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub browser: Option<String>,
}

/// Best-effort user-agent sniffing for device type, OS and browser.
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_lowercase();
    let mut info = DeviceInfo::default();

    if ua.contains("mobile") {
        info.device_type = Some("mobile".to_string());
    } else if ua.contains("tablet") || ua.contains("ipad") {
        info.device_type = Some("tablet".to_string());
    } else if !ua.is_empty() {
        info.device_type = Some("desktop".to_string());
    }

    if ua.contains("iphone") {
        info.os = Some("iOS".to_string());
        info.device_type = Some("mobile".to_string());
        info.os_version = version_after(&ua, "iphone os ").map(|v| v.replace('_', "."));
    } else if ua.contains("ipad") {
        info.os = Some("iOS".to_string());
        info.device_type = Some("tablet".to_string());
        info.os_version = version_after(&ua, "cpu os ").map(|v| v.replace('_', "."));
    } else if ua.contains("android") {
        info.os = Some("Android".to_string());
        info.device_type = Some(if ua.contains("mobile") { "mobile" } else { "tablet" }.to_string());
        info.os_version = version_after(&ua, "android ");
    } else if ua.contains("windows") {
        info.os = Some("Windows".to_string());
        info.os_version = version_after(&ua, "windows nt ");
    } else if ua.contains("macintosh") || ua.contains("mac os") {
        info.os = Some("macOS".to_string());
        info.os_version = version_after(&ua, "mac os x ").map(|v| v.replace('_', "."));
    } else if ua.contains("linux") {
        info.os = Some("Linux".to_string());
    }

    info.browser = if ua.contains("edg/") {
        Some("Edge".to_string())
    } else if ua.contains("opera") || ua.contains("opr/") {
        Some("Opera".to_string())
    } else if ua.contains("chrome") {
        Some("Chrome".to_string())
    } else if ua.contains("safari") {
        Some("Safari".to_string())
    } else if ua.contains("firefox") {
        Some("Firefox".to_string())
    } else {
        None
    };

    info
}

/// Grabs the dotted (or underscored) version token following `marker`.
fn version_after(ua: &str, marker: &str) -> Option<String> {
    let rest = &ua[ua.find(marker)? + marker.len()..];
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '_')
        .collect();
    let token = token.trim_matches(|c| c == '.' || c == '_').to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Primary tag of an Accept-Language header:
/// "zh-CN,zh;q=0.9,en;q=0.8" -> "zh-CN".
pub fn parse_accept_language(header: &str) -> Option<String> {
    let first = header.split(',').next()?;
    let tag = first.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" {
        None
    } else {
        Some(tag.to_string())
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
}

/// Builds a visitor context from request headers and query parameters.
///
/// Geo fields are trusted from `x-geo-*` headers (with `cf-ipcountry` as a
/// country fallback) so geolocation stays an upstream concern.
pub fn build_visitor_context(
    headers: &HeaderMap,
    query_params: HashMap<String, String>,
) -> VisitorContext {
    let mut ctx = VisitorContext {
        country: header_value(headers, "x-geo-country")
            .or_else(|| header_value(headers, "cf-ipcountry")),
        region: header_value(headers, "x-geo-region"),
        city: header_value(headers, "x-geo-city"),
        continent: header_value(headers, "x-geo-continent"),
        timestamp: Some(Utc::now()),
        ..Default::default()
    };

    if let Some(ua) = header_value(headers, "user-agent") {
        let device = parse_user_agent(&ua);
        ctx.device_type = device.device_type;
        ctx.os = device.os;
        ctx.os_version = device.os_version;
        ctx.browser = device.browser;
    }

    if let Some(referer) = header_value(headers, "referer") {
        ctx.referrer_domain = extract_domain(&referer);
        ctx.referrer = Some(referer);
    }

    if let Some(accept_language) = header_value(headers, "accept-language") {
        ctx.language = parse_accept_language(&accept_language);
    }

    ctx.utm_source = query_params.get("utm_source").cloned();
    ctx.utm_medium = query_params.get("utm_medium").cloned();
    ctx.utm_campaign = query_params.get("utm_campaign").cloned();
    ctx.query_params = query_params;

    ctx
}
