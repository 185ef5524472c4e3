//! Dotted numeric version comparison for OS version bounds.

use std::cmp::Ordering;

/// Compares two dotted numeric version strings component-wise, padding
/// the shorter one with zeros ("1.2" == "1.2.0"). Returns `None` when
/// either side does not parse, so callers can skip the bound instead of
/// rejecting the visitor.
pub fn compare(left: &str, right: &str) -> Option<Ordering> {
    let left = parse(left)?;
    let right = parse(right)?;

    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

fn parse(version: &str) -> Option<Vec<u64>> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('.').map(|part| part.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexicographic() {
        // lexicographic comparison would rank "10.0" below "9.0"
        assert_eq!(compare("10.0", "9.0"), Some(Ordering::Greater));
        assert_eq!(compare("9.0", "10.0"), Some(Ordering::Less));
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(compare("1.2", "1.2.0"), Some(Ordering::Equal));
        assert_eq!(compare("1.2.1", "1.2"), Some(Ordering::Greater));
    }

    #[test]
    fn equal_versions() {
        assert_eq!(compare("14.4.1", "14.4.1"), Some(Ordering::Equal));
    }

    #[test]
    fn unparsable_yields_none() {
        assert_eq!(compare("14.beta", "14.0"), None);
        assert_eq!(compare("", "1.0"), None);
        assert_eq!(compare("1.0", "unknown"), None);
    }
}
