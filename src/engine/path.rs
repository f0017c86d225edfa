use crate::engine::errors::PatchError;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Dotted path to a key inside a structured document.
///
/// Segments are separated by `.`; a segment containing dots can be quoted
/// (`annotations."eks.amazonaws.com/role-arn"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    parts: Vec<String>,
}

impl KeyPath {
    pub fn parse(input: &str) -> Result<Self, PatchError> {
        let parts = parse_dotted_path(input)?;
        if parts.is_empty() {
            return Err(PatchError::InvalidKeyPath {
                input: input.to_string(),
                message: "empty key path".to_string(),
            });
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Path of the enclosing mapping; empty for top-level keys.
    pub fn parent(&self) -> &[String] {
        &self.parts[..self.parts.len() - 1]
    }

    /// Final segment, i.e. the key that gets inserted.
    pub fn leaf(&self) -> &str {
        &self.parts[self.parts.len() - 1]
    }

    pub fn is_top_level(&self) -> bool {
        self.parts.len() == 1
    }

    pub fn as_string(&self) -> String {
        self.parts
            .iter()
            .map(|part| {
                if part.contains('.') {
                    format!("\"{part}\"")
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl<'de> Deserialize<'de> for KeyPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        KeyPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn parse_dotted_path(input: &str) -> Result<Vec<String>, PatchError> {
    let invalid = |message: &str| PatchError::InvalidKeyPath {
        input: input.to_string(),
        message: message.to_string(),
    };

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.trim().chars();
    let mut in_quotes = false;
    let mut quote_char = '\0';
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == quote_char {
                in_quotes = false;
                continue;
            }
            if quote_char == '"' && ch == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                    continue;
                }
            }
            current.push(ch);
            continue;
        }

        match ch {
            '.' => {
                if current.is_empty() && !quoted {
                    return Err(invalid("empty path segment"));
                }
                parts.push(std::mem::take(&mut current));
                quoted = false;
            }
            '"' | '\'' => {
                if !current.is_empty() || quoted {
                    return Err(invalid("unexpected quote inside key"));
                }
                in_quotes = true;
                quoted = true;
                quote_char = ch;
            }
            ch if ch.is_whitespace() => {
                return Err(invalid("whitespace not allowed outside quotes"));
            }
            other => current.push(other),
        }
    }

    if in_quotes {
        return Err(invalid("unterminated quoted key"));
    }

    if !current.is_empty() || quoted {
        parts.push(current);
    } else if !parts.is_empty() {
        return Err(invalid("trailing dot"));
    }

    Ok(parts)
}
