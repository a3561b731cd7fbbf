//! Parsing of the environment variables that override file configuration.

/// Parses an interval given as whole seconds, with or without an `s` suffix.
///
/// # Examples
///
/// ```
/// use yamon_common::env::parse_interval_secs;
///
/// assert_eq!(parse_interval_secs("10"), Some(10));
/// assert_eq!(parse_interval_secs(" 300s "), Some(300));
/// assert_eq!(parse_interval_secs("0"), Some(0));
/// assert_eq!(parse_interval_secs("1m"), None);
/// ```
pub fn parse_interval_secs(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.strip_suffix('s').unwrap_or(raw).parse().ok()
}

/// Parses a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
