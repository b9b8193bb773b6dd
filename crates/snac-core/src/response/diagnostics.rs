//! Line-oriented diagnostics reported alongside a response.

use serde::Serialize;
use serde_json::Value;

/// Line terminator used in diagnostics reports.
pub const REPORT_LINE_END: &str = "\r\n";

/// Non-empty, trimmed diagnostic lines in the order they were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    lines: Vec<String>,
}

impl Diagnostics {
    /// Collect lines, dropping any that are empty after trimming.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|line| line.as_ref().trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
        }
    }

    /// Collect the string elements of a JSON array. Anything else is ignored.
    pub fn from_value(value: &Value) -> Self {
        match value.as_array() {
            Some(items) => Self::from_lines(items.iter().filter_map(Value::as_str)),
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Every line followed by `\r\n`.
    pub fn report(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{}{}", line, REPORT_LINE_END))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_lines_excluded() {
        let diagnostics = Diagnostics::from_value(&json!(["bad line 1", "", "bad line 2"]));
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.report(), "bad line 1\r\nbad line 2\r\n");
    }

    #[test]
    fn test_lines_trimmed() {
        let diagnostics = Diagnostics::from_lines(["  <bad/>  ", "\t", "\n<worse/>\n"]);
        assert_eq!(diagnostics.lines(), &["<bad/>", "<worse/>"]);
    }

    #[test]
    fn test_non_strings_ignored() {
        let diagnostics = Diagnostics::from_value(&json!(["kept", 7, null, {"a": 1}]));
        assert_eq!(diagnostics.lines(), &["kept"]);
    }

    #[test]
    fn test_non_array_is_empty() {
        assert!(Diagnostics::from_value(&json!("just text")).is_empty());
        assert_eq!(Diagnostics::default().report(), "");
    }
}
