//! Shared text patterns.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Four consecutive ASCII digits, read as a year.
    pub static ref YEAR_PATTERN: Regex = Regex::new(r"[0-9]{4}").unwrap();
}

/// All non-overlapping 4-digit runs in `text`, scanned left to right.
pub fn extract_years(text: &str) -> Vec<&str> {
    YEAR_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}

/// Years found in `text` joined with `-`, or `None` if there are none.
pub fn joined_years(text: &str) -> Option<String> {
    let years = extract_years(text);
    if years.is_empty() {
        None
    } else {
        Some(years.join("-"))
    }
}
