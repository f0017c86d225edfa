//! Insertion-point resolution.
//!
//! Rules are tried in order: next to the anchor, next to a fallback marker
//! (synthesizing the anchor), and for structured documents at the root.

use crate::engine::detector::resolve;
use crate::engine::fragment::{KeyFragment, LineFragment, Position};
use serde_yaml::{Mapping, Value};

/// Which locator rule produced an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Anchor,
    Fallback,
    Root,
}

/// Where a line fragment goes, resolved against the original line sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub id: String,
    /// Lines are inserted before the original line at this index.
    pub index: usize,
    /// Anchor lines recreated by the fallback rule, emitted first.
    pub synthesized: Vec<String>,
    pub lines: Vec<String>,
    pub rule: Rule,
}

pub fn locate_line<S: AsRef<str>>(lines: &[S], fragment: &LineFragment) -> Option<InsertionPoint> {
    if let Some(anchor) = &fragment.anchor {
        if let Some(idx) = anchor.find(lines) {
            let index = match fragment.position {
                Position::After => idx + 1,
                Position::Before => idx,
            };
            return Some(InsertionPoint {
                id: fragment.id.clone(),
                index,
                synthesized: Vec::new(),
                lines: fragment.lines.clone(),
                rule: Rule::Anchor,
            });
        }
    }

    let fallback = fragment.fallback.as_ref()?;
    let idx = fallback.marker.find(lines)?;
    Some(InsertionPoint {
        id: fragment.id.clone(),
        index: idx + 1,
        synthesized: fallback.synthesize.clone(),
        lines: fragment.lines.clone(),
        rule: Rule::Fallback,
    })
}

/// Where a key fragment goes inside a structured document.
#[derive(Debug, Clone)]
pub struct KeyPlacement {
    pub id: String,
    pub rule: Rule,
    pub fragment: KeyFragment,
}

/// `None` when some existing parent on the path is a scalar or a sequence:
/// content is never replaced to make room for a fragment.
pub fn locate_key(document: &Mapping, fragment: &KeyFragment) -> Option<KeyPlacement> {
    let rule = if fragment.path.is_top_level() {
        Rule::Root
    } else {
        match resolve(document, fragment.path.parent()) {
            Some(Value::Mapping(_)) => Rule::Anchor,
            Some(Value::Null) => Rule::Fallback,
            Some(_) => return None,
            None if blocked_by_non_mapping(document, fragment.path.parent()) => return None,
            None => Rule::Fallback,
        }
    };

    Some(KeyPlacement {
        id: fragment.id.clone(),
        rule,
        fragment: fragment.clone(),
    })
}

/// True when the walk along `parents` stops at an existing non-mapping value.
fn blocked_by_non_mapping(document: &Mapping, parents: &[String]) -> bool {
    let mut current = document;
    for segment in parents {
        match current.get(segment.as_str()) {
            None | Some(Value::Null) => return false,
            Some(Value::Mapping(inner)) => current = inner,
            Some(_) => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::path::KeyPath;
    use crate::engine::pattern::LinePattern;

    fn build_arch() -> LineFragment {
        LineFragment::after(
            "build-arch",
            "build_arch: amd64,arm64",
            LinePattern::Contains("with:".to_string()),
            vec!["      build_arch: amd64,arm64".to_string()],
        )
        .with_fallback(
            LinePattern::Contains("uses: org/workflows/pipeline.yaml@main".to_string()),
            vec!["    with:".to_string()],
        )
    }

    fn key(path: &str) -> KeyFragment {
        KeyFragment::new(path, KeyPath::parse(path).unwrap(), Value::from("v"))
    }

    #[test]
    fn anchor_rule_inserts_after_anchor() {
        let lines = ["jobs:", "  build:", "    with:", "      x: 1"];
        let point = locate_line(&lines, &build_arch()).unwrap();
        assert_eq!(point.index, 3);
        assert_eq!(point.rule, Rule::Anchor);
        assert!(point.synthesized.is_empty());
    }

    #[test]
    fn before_position_uses_anchor_index() {
        let lines = ["a", "b", "c"];
        let fragment = LineFragment::after(
            "x",
            "x",
            LinePattern::Exact("b".to_string()),
            vec!["x".to_string()],
        )
        .with_position(Position::Before);
        assert_eq!(locate_line(&lines, &fragment).unwrap().index, 1);
    }

    #[test]
    fn fallback_rule_synthesizes_anchor() {
        let lines = [
            "jobs:",
            "  build:",
            "    uses: org/workflows/pipeline.yaml@main",
            "    secrets: inherit",
        ];
        let point = locate_line(&lines, &build_arch()).unwrap();
        assert_eq!(point.index, 3);
        assert_eq!(point.rule, Rule::Fallback);
        assert_eq!(point.synthesized, vec!["    with:".to_string()]);
    }

    #[test]
    fn no_anchor_no_fallback_is_not_found() {
        let lines = ["name: lint", "on: push"];
        assert!(locate_line(&lines, &build_arch()).is_none());
    }

    #[test]
    fn key_rules() {
        let document: Mapping =
            serde_yaml::from_str("mysqlMigrations:\n  other: x\nempty:\nflag: true\n").unwrap();

        assert_eq!(locate_key(&document, &key("nodeSelector")).unwrap().rule, Rule::Root);
        assert_eq!(
            locate_key(&document, &key("mysqlMigrations.image")).unwrap().rule,
            Rule::Anchor
        );
        assert_eq!(
            locate_key(&document, &key("empty.image")).unwrap().rule,
            Rule::Fallback
        );
        assert_eq!(
            locate_key(&document, &key("missing.deeper.image")).unwrap().rule,
            Rule::Fallback
        );
        assert!(locate_key(&document, &key("flag.image")).is_none());
        assert!(locate_key(&document, &key("flag.deeper.image")).is_none());
    }
}
