//! Presence checks: is a required fragment already in the file?
//!
//! Both checks are shallow. Line mode looks for a literal
//! substring, so a marker inside a comment counts as present. Structured mode
//! only asks whether the key-path exists; an operator-authored value is never
//! second-guessed unless the fragment opts into `force`.

use crate::engine::fragment::{KeyFragment, LineFragment};
use serde_yaml::{Mapping, Value};

/// True iff any line contains the fragment's marker.
pub fn line_fragment_present<S: AsRef<str>>(lines: &[S], fragment: &LineFragment) -> bool {
    has_marker(lines, &fragment.marker)
}

pub fn has_marker<S: AsRef<str>>(lines: &[S], marker: &str) -> bool {
    lines.iter().any(|line| line.as_ref().contains(marker))
}

/// True iff the key-path resolves; with `force`, the value must also match.
pub fn key_fragment_present(document: &Mapping, fragment: &KeyFragment) -> bool {
    match resolve(document, fragment.path.parts()) {
        Some(current) if fragment.force => current == &fragment.value,
        Some(_) => true,
        None => false,
    }
}

/// Follow `path` through nested mappings.
pub fn resolve<'a>(document: &'a Mapping, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = document.get(first.as_str())?;
    for segment in rest {
        current = current.as_mapping()?.get(segment.as_str())?;
    }
    Some(current)
}
