//! Utility functions for path manipulation

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Characters that are invalid in file or folder names on at least one
/// mainstream filesystem, ASCII control characters, and `%` (the escape
/// character itself)
fn reserved_chars() -> &'static Regex {
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    RESERVED.get_or_init(|| {
        // The pattern is a literal known to compile
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"[<>:"/\\|?*%\x00-\x1f]"#).unwrap()
    })
}

/// Make `name` safe to use as a single path component
///
/// Percent-encodes `< > : " / \ | ? * %` and control characters, so distinct
/// names always map to distinct components. Names made only of dots (`.`,
/// `..`) have their dots encoded as `%2E`. An empty name is replaced by
/// `fallback`.
///
/// # Examples
///
/// ```
/// use airtable_backup::utils::sanitize_path_component;
///
/// assert_eq!(sanitize_path_component("a.png", "attachment"), "a.png");
/// assert_eq!(sanitize_path_component("Q1/Q2: plan?", "field"), "Q1%2FQ2%3A plan%3F");
/// assert_eq!(sanitize_path_component("..", "field"), "%2E%2E");
/// assert_eq!(sanitize_path_component("", "field"), "field");
/// ```
#[must_use]
pub fn sanitize_path_component(name: &str, fallback: &str) -> String {
    if name.is_empty() {
        return fallback.to_string();
    }
    if name.chars().all(|c| c == '.') {
        return "%2E".repeat(name.len());
    }
    reserved_chars()
        .replace_all(name, |caps: &Captures| urlencoding::encode(&caps[0]).into_owned())
        .into_owned()
}

/// Format a byte count as mebibytes with two decimals
///
/// ```
/// use airtable_backup::utils::format_megabytes;
///
/// assert_eq!(format_megabytes(1024 * 1024), "1.00 MB");
/// assert_eq!(format_megabytes(0), "0.00 MB");
/// ```
#[must_use]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
