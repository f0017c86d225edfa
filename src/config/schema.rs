use crate::discovery::FileMatcher;
use crate::engine::{PatchSpec, Substitution};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MigratorConfig {
    /// Search root; relative paths are resolved against the config file.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl MigratorConfig {
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|target| target.name == name)
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|target| target.name.as_str()).collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.targets.is_empty() {
            issues.push(ValidationIssue::EmptyTargetList);
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target: None,
                    field: "name",
                });
            } else if !names.insert(target.name.as_str()) {
                issues.push(ValidationIssue::DuplicateTarget {
                    name: target.name.clone(),
                });
            }
            target.collect_issues(&mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// One file kind: where to look, which files to pick, what to require.
#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub name: String,
    /// Directory under the root that is walked recursively.
    pub subpath: PathBuf,
    /// A missing directory is an error when set, a skipped target otherwise.
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(rename = "match")]
    pub matcher: FileMatcher,
    pub patch: PatchSpec,
}

fn default_required() -> bool {
    true
}

impl TargetConfig {
    fn collect_issues(&self, issues: &mut Vec<ValidationIssue>) {
        let target = Some(self.name.clone());

        if self.subpath.is_absolute() {
            issues.push(ValidationIssue::InvalidCombo {
                target: target.clone(),
                message: format!(
                    "subpath must be relative to the root: {}",
                    self.subpath.display()
                ),
            });
        }

        if self.matcher.is_empty() {
            issues.push(ValidationIssue::MissingField {
                target: target.clone(),
                field: "match.names or match.suffixes",
            });
        }

        if self.patch.is_empty() {
            issues.push(ValidationIssue::MissingField {
                target: target.clone(),
                field: "patch.fragments",
            });
        }

        let mut ids = HashSet::new();
        for id in self.patch.ids() {
            if id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    target: target.clone(),
                    field: "id",
                });
            } else if !ids.insert(id) {
                issues.push(ValidationIssue::DuplicateId {
                    target: self.name.clone(),
                    id: id.to_string(),
                });
            }
        }

        match &self.patch {
            PatchSpec::Line {
                fragments,
                substitutions,
            } => {
                for fragment in fragments {
                    if fragment.marker.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            target: target.clone(),
                            field: "fragments.marker",
                        });
                    }
                    if fragment.lines.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            target: target.clone(),
                            field: "fragments.lines",
                        });
                    }
                    if fragment.anchor.is_none() && fragment.fallback.is_none() {
                        issues.push(ValidationIssue::InvalidCombo {
                            target: target.clone(),
                            message: format!(
                                "fragment '{}' needs an anchor or a fallback",
                                fragment.id
                            ),
                        });
                    }
                    if !fragment.lines.iter().any(|line| line.contains(&fragment.marker)) {
                        issues.push(ValidationIssue::NotIdempotent {
                            target: self.name.clone(),
                            id: fragment.id.clone(),
                            reason: "no inserted line contains the marker",
                        });
                    } else if !fragment
                        .lines
                        .iter()
                        .map(|line| rewritten(line, substitutions))
                        .any(|line| line.contains(&fragment.marker))
                    {
                        issues.push(ValidationIssue::NotIdempotent {
                            target: self.name.clone(),
                            id: fragment.id.clone(),
                            reason: "substitutions rewrite the marker out of the inserted lines",
                        });
                    }

                    let mut texts: Vec<(&'static str, &str)> = vec![("marker", fragment.marker.as_str())];
                    texts.extend(fragment.lines.iter().map(|line| ("lines", line.as_str())));
                    if let Some(anchor) = &fragment.anchor {
                        texts.push(("anchor", anchor.text()));
                    }
                    if let Some(fallback) = &fragment.fallback {
                        texts.push(("fallback.marker", fallback.marker.text()));
                        texts.extend(
                            fallback
                                .synthesize
                                .iter()
                                .map(|line| ("fallback.synthesize", line.as_str())),
                        );
                    }
                    self.check_single_line(&fragment.id, texts, issues);
                }
                for substitution in substitutions {
                    self.check_single_line(
                        &substitution.id,
                        vec![
                            ("when", substitution.when.text()),
                            ("unless_contains", substitution.unless_contains.as_str()),
                            ("find", substitution.find.as_str()),
                            ("replace", substitution.replace.as_str()),
                        ],
                        issues,
                    );
                    if substitution.find.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            target: target.clone(),
                            field: "substitutions.find",
                        });
                    }
                    if !substitution.is_idempotent() {
                        issues.push(ValidationIssue::NotIdempotent {
                            target: self.name.clone(),
                            id: substitution.id.clone(),
                            reason: "replacement does not contain unless_contains",
                        });
                    }
                }
            }
            PatchSpec::Structured { .. } => {}
        }
    }
}

impl TargetConfig {
    /// Files are patched line by line, so no configured text may span lines.
    fn check_single_line(
        &self,
        id: &str,
        texts: Vec<(&'static str, &str)>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for (field, text) in texts {
            if text.contains(|c: char| c == '\n' || c == '\r') {
                issues.push(ValidationIssue::MultiLine {
                    target: self.name.clone(),
                    id: id.to_string(),
                    field,
                });
            }
        }
    }
}

/// `line` after every substitution has had its turn, in order.
fn rewritten(line: &str, substitutions: &[Substitution]) -> String {
    substitutions
        .iter()
        .fold(line.to_string(), |current, substitution| {
            substitution.rewrite(&current).unwrap_or(current)
        })
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyTargetList,
    MissingField {
        target: Option<String>,
        field: &'static str,
    },
    DuplicateTarget {
        name: String,
    },
    DuplicateId {
        target: String,
        id: String,
    },
    NotIdempotent {
        target: String,
        id: String,
        reason: &'static str,
    },
    InvalidCombo {
        target: Option<String>,
        message: String,
    },
    MultiLine {
        target: String,
        id: String,
        field: &'static str,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTargetList => write!(f, "config contains no targets"),
            ValidationIssue::MissingField { target, field } => match target {
                Some(name) => write!(f, "target '{name}' missing required field '{field}'"),
                None => write!(f, "target missing required field '{field}'"),
            },
            ValidationIssue::DuplicateTarget { name } => {
                write!(f, "target '{name}' is defined more than once")
            }
            ValidationIssue::DuplicateId { target, id } => {
                write!(f, "target '{target}' uses id '{id}' more than once")
            }
            ValidationIssue::NotIdempotent { target, id, reason } => {
                write!(f, "target '{target}': '{id}' would apply repeatedly ({reason})")
            }
            ValidationIssue::MultiLine { target, id, field } => {
                write!(f, "target '{target}': '{id}' has a line break in '{field}'")
            }
            ValidationIssue::InvalidCombo { target, message } => match target {
                Some(name) => write!(f, "target '{name}' has invalid configuration: {message}"),
                None => write!(f, "invalid configuration: {message}"),
            },
        }
    }
}
