//! String-comparison operators for query-parameter conditions.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Caps compiled regex size so attacker-influenced patterns cannot blow up
/// memory at compile time. The regex crate's match engine itself runs in
/// linear time, so no execution guard is needed.
const REGEX_SIZE_LIMIT: usize = 1 << 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    /// Expected value is a comma-separated list; membership test after
    /// trimming each entry.
    In,
    NotIn,
    /// Case-insensitive pattern tested against the raw actual value.
    Regex,
    /// Operator values we do not recognize evaluate to false rather than
    /// failing deserialization.
    #[serde(other)]
    Unknown,
}

impl MatchOperator {
    /// Total and infallible: malformed patterns and unknown operators
    /// evaluate to false, never an error.
    ///
    /// All comparisons except `regex` lowercase both operands first.
    pub fn evaluate(self, actual: &str, expected: &str) -> bool {
        if self == Self::Regex {
            return match RegexBuilder::new(expected)
                .case_insensitive(true)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
            {
                Ok(re) => re.is_match(actual),
                Err(_) => false,
            };
        }

        let actual = actual.to_lowercase();
        let expected = expected.to_lowercase();

        match self {
            Self::Equals => actual == expected,
            Self::NotEquals => actual != expected,
            Self::Contains => actual.contains(&expected),
            Self::NotContains => !actual.contains(&expected),
            Self::StartsWith => actual.starts_with(&expected),
            Self::EndsWith => actual.ends_with(&expected),
            Self::In => expected.split(',').any(|item| item.trim() == actual),
            Self::NotIn => !expected.split(',').any(|item| item.trim() == actual),
            Self::Regex | Self::Unknown => false,
        }
    }
}
