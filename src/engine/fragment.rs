//! Patch specifications: the fragments a file must contain and the rules for
//! placing them.

use crate::engine::path::KeyPath;
use crate::engine::pattern::LinePattern;
use crate::engine::Mode;
use serde::{Deserialize, Deserializer};

/// Ordered set of required fragments for one file kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PatchSpec {
    /// File is an ordered sequence of text lines.
    Line {
        #[serde(default)]
        fragments: Vec<LineFragment>,
        #[serde(default)]
        substitutions: Vec<Substitution>,
    },
    /// File is a YAML mapping that gets merged and re-rendered.
    Structured {
        #[serde(default)]
        fragments: Vec<KeyFragment>,
    },
}

impl PatchSpec {
    pub fn mode(&self) -> Mode {
        match self {
            PatchSpec::Line { .. } => Mode::Line,
            PatchSpec::Structured { .. } => Mode::Structured,
        }
    }

    /// Ids of every fragment and substitution, in declaration order.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            PatchSpec::Line {
                fragments,
                substitutions,
            } => fragments
                .iter()
                .map(|f| f.id.as_str())
                .chain(substitutions.iter().map(|s| s.id.as_str()))
                .collect(),
            PatchSpec::Structured { fragments } => {
                fragments.iter().map(|f| f.id.as_str()).collect()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PatchSpec::Line {
                fragments,
                substitutions,
            } => fragments.is_empty() && substitutions.is_empty(),
            PatchSpec::Structured { fragments } => fragments.is_empty(),
        }
    }
}

/// Anything the orchestrator reports on by id.
pub trait Fragment {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Before,
    #[default]
    After,
}

/// Lines to insert when `marker` is absent from every line of the file.
#[derive(Debug, Clone, Deserialize)]
pub struct LineFragment {
    pub id: String,
    /// Exact substring whose presence on any line means "already applied".
    pub marker: String,
    #[serde(default)]
    pub anchor: Option<LinePattern>,
    #[serde(default)]
    pub position: Position,
    pub lines: Vec<String>,
    #[serde(default)]
    pub fallback: Option<Fallback>,
}

impl LineFragment {
    /// Fragment inserted right after the first line matching `anchor`.
    pub fn after(
        id: impl Into<String>,
        marker: impl Into<String>,
        anchor: LinePattern,
        lines: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            marker: marker.into(),
            anchor: Some(anchor),
            position: Position::After,
            lines,
            fallback: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_fallback(mut self, marker: LinePattern, synthesize: Vec<String>) -> Self {
        self.fallback = Some(Fallback { marker, synthesize });
        self
    }
}

impl Fragment for LineFragment {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Used when the anchor line is missing: `synthesize` recreates the anchor
/// right after the first line matching `marker`.
#[derive(Debug, Clone, Deserialize)]
pub struct Fallback {
    pub marker: LinePattern,
    #[serde(default)]
    pub synthesize: Vec<String>,
}

/// In-place rewrite of matching lines, e.g. injecting an option into an
/// instruction.
#[derive(Debug, Clone, Deserialize)]
pub struct Substitution {
    pub id: String,
    pub when: LinePattern,
    /// Lines already containing this text are left alone.
    pub unless_contains: String,
    pub find: String,
    pub replace: String,
}

impl Substitution {
    /// Rewritten line, or `None` when the line is not a target.
    pub fn rewrite(&self, line: &str) -> Option<String> {
        if !self.when.matches(line) || line.contains(self.unless_contains.as_str()) {
            return None;
        }
        if !line.contains(self.find.as_str()) {
            return None;
        }
        Some(line.replacen(self.find.as_str(), &self.replace, 1))
    }

    /// A rewritten line must not be a target again.
    pub fn is_idempotent(&self) -> bool {
        self.replace.contains(self.unless_contains.as_str()) && !self.unless_contains.is_empty()
    }
}

impl Fragment for Substitution {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Key that must exist in a structured document.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyFragment {
    pub id: String,
    pub path: KeyPath,
    /// Written in config as a YAML snippet.
    #[serde(deserialize_with = "yaml_snippet")]
    pub value: serde_yaml::Value,
    /// Overwrite an existing value that differs instead of leaving it alone.
    #[serde(default)]
    pub force: bool,
}

impl KeyFragment {
    pub fn new(id: impl Into<String>, path: KeyPath, value: serde_yaml::Value) -> Self {
        Self {
            id: id.into(),
            path,
            value,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

impl Fragment for KeyFragment {
    fn id(&self) -> &str {
        &self.id
    }
}

fn yaml_snippet<'de, D>(deserializer: D) -> Result<serde_yaml::Value, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    serde_yaml::from_str(&raw).map_err(|err| {
        serde::de::Error::custom(format!("value is not valid YAML: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform() -> Substitution {
        Substitution {
            id: "platform".to_string(),
            when: LinePattern::Prefix("FROM".to_string()),
            unless_contains: "--platform=".to_string(),
            find: "FROM".to_string(),
            replace: "FROM --platform=${TARGETPLATFORM}".to_string(),
        }
    }

    #[test]
    fn substitution_rewrites_first_occurrence() {
        let rewritten = platform().rewrite("FROM golang:1.22 AS FROM_STAGE").unwrap();
        assert_eq!(
            rewritten,
            "FROM --platform=${TARGETPLATFORM} golang:1.22 AS FROM_STAGE"
        );
    }

    #[test]
    fn substitution_skips_lines_with_option() {
        assert!(platform()
            .rewrite("FROM --platform=linux/amd64 alpine")
            .is_none());
        assert!(platform().rewrite("RUN make").is_none());
    }

    #[test]
    fn substitution_idempotence_check() {
        assert!(platform().is_idempotent());
        let mut broken = platform();
        broken.replace = "FROM --arch".to_string();
        assert!(!broken.is_idempotent());
    }

    #[test]
    fn spec_reports_mode_and_ids() {
        let spec = PatchSpec::Line {
            fragments: vec![LineFragment::after(
                "build-arch",
                "build_arch:",
                LinePattern::Contains("with:".to_string()),
                vec!["      build_arch: amd64,arm64".to_string()],
            )],
            substitutions: vec![platform()],
        };
        assert_eq!(spec.mode(), Mode::Line);
        assert_eq!(spec.ids(), vec!["build-arch", "platform"]);
        assert!(!spec.is_empty());
    }
}
