//! Small string helpers used by the scraper and for log output.

/// Collapse every run of whitespace into a single space and trim both ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string for logging purposes.
///
/// Keeps at most `max` characters and appends `"…"` when anything was cut.
/// Counts characters, not bytes, so multi-byte titles never split mid-char.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("abcdef", 3), "abc…");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…", &s[..idx]),
    }
}
