//! Duration tokens used by uptime queries and badges ("24h", "30d", "720").

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Rejected duration token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration: {0:?}")]
    Invalid(String),
    #[error("duration must be greater than zero: {0:?}")]
    Zero(String),
    #[error("duration too large: {0:?}")]
    Overflow(String),
}

/// Unit suffix to seconds multiplier.
const UNITS: &[(&str, u64)] = &[
    ("s", 1),
    ("m", 60),
    ("h", 3_600),
    ("d", 86_400),
    ("w", 604_800),
];

/// Normalize a token: a bare number means hours.
///
/// `"24"` becomes `"24h"`; anything else is returned unchanged.
pub fn normalize_duration(token: &str) -> String {
    static BARE: OnceLock<Regex> = OnceLock::new();
    let bare = BARE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap());

    let token = token.trim();
    if bare.is_match(token) {
        format!("{}h", token)
    } else {
        token.to_string()
    }
}

/// Parse a duration token into seconds.
pub fn parse_duration(token: &str) -> Result<u64, DurationError> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN.get_or_init(|| Regex::new(r"^([0-9]+)([smhdw])$").unwrap());

    let normalized = normalize_duration(token);
    let caps = re
        .captures(&normalized)
        .ok_or_else(|| DurationError::Invalid(token.to_string()))?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| DurationError::Overflow(token.to_string()))?;
    let multiplier = UNITS
        .iter()
        .find(|(suffix, _)| *suffix == &caps[2])
        .map(|(_, m)| *m)
        .ok_or_else(|| DurationError::Invalid(token.to_string()))?;

    if amount == 0 {
        return Err(DurationError::Zero(token.to_string()));
    }

    amount
        .checked_mul(multiplier)
        .ok_or_else(|| DurationError::Overflow(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("24h"), Ok(86_400));
        assert_eq!(parse_duration("720h"), Ok(2_592_000));
        assert_eq!(parse_duration("30d"), Ok(2_592_000));
        assert_eq!(parse_duration("1w"), Ok(604_800));
        assert_eq!(parse_duration("90m"), Ok(5_400));
        assert_eq!(parse_duration("45s"), Ok(45));
    }

    #[test]
    fn test_bare_number_is_hours() {
        assert_eq!(normalize_duration("24"), "24h");
        assert_eq!(normalize_duration("24h"), "24h");
        assert_eq!(parse_duration("1"), Ok(3_600));
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(matches!(parse_duration(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("1.5h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-1h"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("10y"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("0h"), Err(DurationError::Zero(_))));
        assert!(matches!(
            parse_duration("99999999999999999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }
}
