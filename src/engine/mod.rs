//! The patch engine: content in, content out, no I/O.
//!
//! [`apply_patch_spec`] runs the same pipeline for every file kind: ask the
//! detector whether each fragment is present, ask the locator where missing
//! ones go, then let the mode's patcher apply everything in one pass.

pub mod detector;
pub mod errors;
pub mod fragment;
pub mod lines;
pub mod locator;
pub mod path;
pub mod pattern;
pub mod structured;

pub use errors::PatchError;
pub use fragment::{
    Fallback, Fragment, KeyFragment, LineFragment, PatchSpec, Position, Substitution,
};
pub use locator::{InsertionPoint, KeyPlacement, Rule};
pub use path::KeyPath;
pub use pattern::LinePattern;

use serde_yaml::Mapping;
use std::fmt;
use tracing::{debug, trace};

/// How a file is treated while patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Line,
    Structured,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Line => write!(f, "line"),
            Mode::Structured => write!(f, "structured"),
        }
    }
}

/// What happened to one fragment or substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    /// Detector found it; nothing to do.
    Present,
    /// Inserted by this run.
    Applied,
    /// Substitution rewrote at least one line.
    Rewritten,
    /// Substitution found no line to rewrite.
    NoMatch,
    /// Missing, but the locator found nowhere to put it.
    NoTarget,
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FragmentStatus::Present => "present",
            FragmentStatus::Applied => "applied",
            FragmentStatus::Rewritten => "rewritten",
            FragmentStatus::NoMatch => "no match",
            FragmentStatus::NoTarget => "no insertion target",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentReport {
    pub id: String,
    pub status: FragmentStatus,
}

/// Result of patching one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome carries the patched content"]
pub struct PatchOutcome {
    pub changed: bool,
    /// Patched content, or the original text when nothing changed.
    pub content: String,
    pub fragments: Vec<FragmentReport>,
}

impl PatchOutcome {
    pub fn status_of(&self, id: &str) -> Option<FragmentStatus> {
        self.fragments
            .iter()
            .find(|report| report.id == id)
            .map(|report| report.status)
    }

    /// Fragments that are missing and could not be placed.
    pub fn unplaced(&self) -> impl Iterator<Item = &FragmentReport> {
        self.fragments
            .iter()
            .filter(|report| report.status == FragmentStatus::NoTarget)
    }
}

/// Apply `spec` to raw file content.
///
/// Fails only for content that is not UTF-8 or, in structured mode, not a
/// YAML mapping. A fragment with no insertion target is reported as
/// [`FragmentStatus::NoTarget`] and leaves the file alone.
pub fn apply_patch_spec(content: &[u8], spec: &PatchSpec) -> Result<PatchOutcome, PatchError> {
    let text = std::str::from_utf8(content)?;
    match spec {
        PatchSpec::Line {
            fragments,
            substitutions,
        } => run(
            &LineMode {
                fragments,
                substitutions,
            },
            text,
        ),
        PatchSpec::Structured { fragments } => run(&StructuredMode { fragments }, text),
    }
}

/// Per-mode halves of the detect/locate/apply pipeline.
trait PatchMode {
    type Document;
    type Fragment: Fragment;
    type Pending;

    fn fragments(&self) -> &[Self::Fragment];
    fn parse(&self, text: &str) -> Result<Self::Document, PatchError>;
    fn is_satisfied(&self, document: &Self::Document, fragment: &Self::Fragment) -> bool;
    fn locate(&self, document: &Self::Document, fragment: &Self::Fragment)
        -> Option<Self::Pending>;
    /// Apply all pending insertions. Returns reports that override or extend
    /// the ones produced while locating.
    fn apply(&self, document: &mut Self::Document, pending: Vec<Self::Pending>)
        -> Vec<FragmentReport>;
    fn render(&self, document: &Self::Document) -> Result<String, PatchError>;
}

fn run<M: PatchMode>(mode: &M, text: &str) -> Result<PatchOutcome, PatchError> {
    let mut document = mode.parse(text)?;
    let mut reports = Vec::with_capacity(mode.fragments().len());
    let mut pending = Vec::new();

    for fragment in mode.fragments() {
        let status = if mode.is_satisfied(&document, fragment) {
            FragmentStatus::Present
        } else if let Some(point) = mode.locate(&document, fragment) {
            pending.push(point);
            FragmentStatus::Applied
        } else {
            FragmentStatus::NoTarget
        };
        trace!(fragment = fragment.id(), %status, "fragment checked");
        reports.push(FragmentReport {
            id: fragment.id().to_string(),
            status,
        });
    }

    for update in mode.apply(&mut document, pending) {
        match reports.iter_mut().find(|report| report.id == update.id) {
            Some(existing) => existing.status = update.status,
            None => reports.push(update),
        }
    }

    let changed = reports.iter().any(|report| {
        matches!(
            report.status,
            FragmentStatus::Applied | FragmentStatus::Rewritten
        )
    });
    let content = if changed {
        mode.render(&document)?
    } else {
        text.to_string()
    };
    debug!(changed, fragments = reports.len(), "patch spec evaluated");

    Ok(PatchOutcome {
        changed,
        content,
        fragments: reports,
    })
}

struct LineMode<'s> {
    fragments: &'s [LineFragment],
    substitutions: &'s [Substitution],
}

impl PatchMode for LineMode<'_> {
    type Document = Vec<String>;
    type Fragment = LineFragment;
    type Pending = InsertionPoint;

    fn fragments(&self) -> &[LineFragment] {
        self.fragments
    }

    fn parse(&self, text: &str) -> Result<Vec<String>, PatchError> {
        Ok(lines::split_lines(text)
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    fn is_satisfied(&self, document: &Vec<String>, fragment: &LineFragment) -> bool {
        detector::line_fragment_present(document.as_slice(), fragment)
    }

    fn locate(&self, document: &Vec<String>, fragment: &LineFragment) -> Option<InsertionPoint> {
        locator::locate_line(document.as_slice(), fragment)
    }

    fn apply(
        &self,
        document: &mut Vec<String>,
        pending: Vec<InsertionPoint>,
    ) -> Vec<FragmentReport> {
        let pass = lines::apply(document.as_slice(), pending, self.substitutions);
        let reports = self
            .substitutions
            .iter()
            .map(|substitution| FragmentReport {
                id: substitution.id.clone(),
                status: if pass.rewritten.contains(&substitution.id) {
                    FragmentStatus::Rewritten
                } else {
                    FragmentStatus::NoMatch
                },
            })
            .collect();
        *document = pass.lines;
        reports
    }

    fn render(&self, document: &Vec<String>) -> Result<String, PatchError> {
        Ok(lines::join_lines(document.as_slice()))
    }
}

struct StructuredMode<'s> {
    fragments: &'s [KeyFragment],
}

impl PatchMode for StructuredMode<'_> {
    type Document = Mapping;
    type Fragment = KeyFragment;
    type Pending = KeyPlacement;

    fn fragments(&self) -> &[KeyFragment] {
        self.fragments
    }

    fn parse(&self, text: &str) -> Result<Mapping, PatchError> {
        structured::parse_document(text)
    }

    fn is_satisfied(&self, document: &Mapping, fragment: &KeyFragment) -> bool {
        detector::key_fragment_present(document, fragment)
    }

    fn locate(&self, document: &Mapping, fragment: &KeyFragment) -> Option<KeyPlacement> {
        locator::locate_key(document, fragment)
    }

    fn apply(&self, document: &mut Mapping, pending: Vec<KeyPlacement>) -> Vec<FragmentReport> {
        let pass = structured::merge(document, pending);
        let present = pass.present.into_iter().map(|id| FragmentReport {
            id,
            status: FragmentStatus::Present,
        });
        let blocked = pass.blocked.into_iter().map(|id| FragmentReport {
            id,
            status: FragmentStatus::NoTarget,
        });
        present.chain(blocked).collect()
    }

    fn render(&self, document: &Mapping) -> Result<String, PatchError> {
        structured::render_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;

    fn ci_spec() -> PatchSpec {
        PatchSpec::Line {
            fragments: vec![LineFragment::after(
                "build-arch",
                "build_arch: amd64,arm64",
                LinePattern::Contains("with:".to_string()),
                vec!["      build_arch: amd64,arm64".to_string()],
            )
            .with_fallback(
                LinePattern::Contains("uses: org/base/pipeline.yaml@main".to_string()),
                vec!["    with:".to_string()],
            )],
            substitutions: Vec::new(),
        }
    }

    fn values_spec() -> PatchSpec {
        PatchSpec::Structured {
            fragments: vec![
                KeyFragment::new(
                    "node-selector",
                    KeyPath::parse("nodeSelector").unwrap(),
                    serde_yaml::from_str("dedicated-to: multi-arch").unwrap(),
                ),
                KeyFragment::new(
                    "tolerations",
                    KeyPath::parse("tolerations").unwrap(),
                    serde_yaml::from_str("- key: dedicated-to\n  effect: NoSchedule").unwrap(),
                ),
            ],
        }
    }

    #[test]
    fn line_mode_inserts_after_anchor_once() {
        let input = "jobs:\n  build:\n    with:\n      x: 1\n";
        let first = apply_patch_spec(input.as_bytes(), &ci_spec()).unwrap();
        assert!(first.changed);
        assert_eq!(
            first.content,
            "jobs:\n  build:\n    with:\n      build_arch: amd64,arm64\n      x: 1\n"
        );
        assert_eq!(first.status_of("build-arch"), Some(FragmentStatus::Applied));

        let second = apply_patch_spec(first.content.as_bytes(), &ci_spec()).unwrap();
        assert!(!second.changed);
        assert_eq!(second.content, first.content);
        assert_eq!(second.status_of("build-arch"), Some(FragmentStatus::Present));
    }

    #[test]
    fn line_mode_without_target_is_a_noop() {
        let input = "name: lint\non: push\n";
        let outcome = apply_patch_spec(input.as_bytes(), &ci_spec()).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.content, input);
        assert_eq!(outcome.unplaced().count(), 1);
    }

    #[test]
    fn unchanged_content_is_returned_verbatim() {
        let input = "jobs:\n      build_arch: amd64,arm64";
        let outcome = apply_patch_spec(input.as_bytes(), &ci_spec()).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.content, input);
    }

    #[test]
    fn structured_mode_merges_and_sorts() {
        let outcome = apply_patch_spec(b"replicas: 2\n", &values_spec()).unwrap();
        assert!(outcome.changed);
        let blocks: Vec<&str> = outcome.content.split("\n\n").collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("nodeSelector:"));
        assert!(blocks[1].starts_with("replicas: 2"));
        assert!(blocks[2].starts_with("tolerations:"));

        let again = apply_patch_spec(outcome.content.as_bytes(), &values_spec()).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn structured_parse_error_is_reported() {
        let err = apply_patch_spec(b"replicas: [2\n", &values_spec()).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = apply_patch_spec(&[0xff, 0xfe], &ci_spec()).unwrap_err();
        assert!(matches!(err, PatchError::InvalidUtf8(_)));
    }

    #[test]
    fn substitutions_report_rewrites() {
        let spec = PatchSpec::Line {
            fragments: Vec::new(),
            substitutions: vec![Substitution {
                id: "platform".to_string(),
                when: LinePattern::Prefix("FROM".to_string()),
                unless_contains: "--platform=".to_string(),
                find: "FROM".to_string(),
                replace: "FROM --platform=${TARGETPLATFORM}".to_string(),
            }],
        };
        let outcome = apply_patch_spec(b"FROM alpine\nRUN true", &spec).unwrap();
        assert!(outcome.changed);
        assert_eq!(
            outcome.content,
            "FROM --platform=${TARGETPLATFORM} alpine\nRUN true\n"
        );
        assert_eq!(outcome.status_of("platform"), Some(FragmentStatus::Rewritten));

        let again = apply_patch_spec(outcome.content.as_bytes(), &spec).unwrap();
        assert!(!again.changed);
        assert_eq!(again.status_of("platform"), Some(FragmentStatus::NoMatch));
    }

    #[test]
    fn inserted_line_is_rewritten_once() {
        let spec = PatchSpec::Line {
            fragments: vec![LineFragment::after(
                "tools-stage",
                "base AS tools",
                LinePattern::Exact("# stages".to_string()),
                vec!["FROM base AS tools".to_string()],
            )],
            substitutions: vec![Substitution {
                id: "platform".to_string(),
                when: LinePattern::Prefix("FROM".to_string()),
                unless_contains: "--platform=".to_string(),
                find: "FROM".to_string(),
                replace: "FROM --platform=${TARGETPLATFORM}".to_string(),
            }],
        };

        let first = apply_patch_spec(b"# stages\nFROM golang\n", &spec).unwrap();
        assert_eq!(
            first.content,
            "# stages\nFROM --platform=${TARGETPLATFORM} base AS tools\nFROM --platform=${TARGETPLATFORM} golang\n"
        );
        assert_eq!(first.status_of("tools-stage"), Some(FragmentStatus::Applied));

        let second = apply_patch_spec(first.content.as_bytes(), &spec).unwrap();
        assert!(!second.changed);
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn key_set_earlier_in_same_pass_is_present() {
        let spec = PatchSpec::Structured {
            fragments: vec![
                KeyFragment::new(
                    "parent",
                    KeyPath::parse("a").unwrap(),
                    serde_yaml::from_str("b: 1").unwrap(),
                ),
                KeyFragment::new("child", KeyPath::parse("a.b").unwrap(), Value::from(2)),
            ],
        };

        let outcome = apply_patch_spec(b"replicas: 1\n", &spec).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.status_of("parent"), Some(FragmentStatus::Applied));
        assert_eq!(outcome.status_of("child"), Some(FragmentStatus::Present));
        assert_eq!(outcome.unplaced().count(), 0);
        assert!(outcome.content.starts_with("a:\n  b: 1\n"));
    }
}
