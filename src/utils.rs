//! Utility functions for log formatting and column-name normalization.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_IDENT_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_]+").expect("static regex is valid"));

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes, on a character boundary,
/// with an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Normalize a column name into a plain SQL-friendly identifier.
///
/// Lowercases the name, collapses every run of characters that are not
/// letters, digits or `_` into a single underscore, and trims underscores
/// from both ends. Accented letters are kept. A name with nothing usable
/// left becomes `"column"`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_column("Published At"), "published_at");
/// assert_eq!(normalize_column("  Título (PT) "), "título_pt");
/// ```
pub fn normalize_column(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced = NON_IDENT_RUN.replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "column".to_string()
    } else {
        trimmed.to_string()
    }
}
