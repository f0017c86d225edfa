use serde::Deserialize;
use std::fmt;

/// A test applied to a single line of a line-mode document.
///
/// Written in config as `{ contains = "with:" }`, `{ prefix = "FROM" }` or
/// `{ exact = "jobs:" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinePattern {
    /// Line contains the text anywhere.
    Contains(String),
    /// Line, with leading whitespace removed, starts with the text.
    Prefix(String),
    /// Line, with surrounding whitespace removed, equals the text.
    Exact(String),
}

impl LinePattern {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            LinePattern::Contains(text) => line.contains(text.as_str()),
            LinePattern::Prefix(text) => line.trim_start().starts_with(text.as_str()),
            LinePattern::Exact(text) => line.trim() == text,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            LinePattern::Contains(text) | LinePattern::Prefix(text) | LinePattern::Exact(text) => {
                text
            }
        }
    }

    /// Index of the first matching line.
    pub fn find<S: AsRef<str>>(&self, lines: &[S]) -> Option<usize> {
        lines.iter().position(|line| self.matches(line.as_ref()))
    }
}

impl fmt::Display for LinePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinePattern::Contains(text) => write!(f, "contains {text:?}"),
            LinePattern::Prefix(text) => write!(f, "prefix {text:?}"),
            LinePattern::Exact(text) => write!(f, "exact {text:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_matches_anywhere() {
        let pattern = LinePattern::Contains("with:".to_string());
        assert!(pattern.matches("    with:"));
        assert!(pattern.matches("  # configure with: care"));
        assert!(!pattern.matches("    without"));
    }

    #[test]
    fn prefix_ignores_leading_whitespace() {
        let pattern = LinePattern::Prefix("FROM".to_string());
        assert!(pattern.matches("FROM golang:1.22"));
        assert!(pattern.matches("   FROM alpine"));
        assert!(!pattern.matches("# FROM alpine"));
    }

    #[test]
    fn exact_compares_trimmed_line() {
        let pattern = LinePattern::Exact("jobs:".to_string());
        assert!(pattern.matches("jobs:  "));
        assert!(!pattern.matches("jobs: []"));
    }

    #[test]
    fn find_returns_first_match() {
        let pattern = LinePattern::Contains("with:".to_string());
        let lines = ["a", "with: 1", "with: 2"];
        assert_eq!(pattern.find(&lines), Some(1));
        assert_eq!(LinePattern::Exact("zzz".to_string()).find(&lines), None);
    }
}
