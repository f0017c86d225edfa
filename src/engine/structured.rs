//! Structured-mode patcher for YAML values documents.
//!
//! Merging never removes or rewrites an existing key unless a fragment is
//! forced. Rendering is canonical: top-level keys sorted, one block per key,
//! a blank line between blocks. Nested mappings keep their insertion order,
//! which `serde_yaml::Mapping` guarantees, so output is deterministic.

use crate::engine::errors::PatchError;
use crate::engine::locator::KeyPlacement;
use serde_yaml::{Mapping, Value};

/// Parse a document whose top level must be a mapping. Empty or comment-only
/// input is an empty mapping.
pub fn parse_document(text: &str) -> Result<Mapping, PatchError> {
    let value: Value = serde_yaml::from_str(text).map_err(|err| PatchError::Parse {
        message: err.to_string(),
    })?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(PatchError::Parse {
            message: format!("top-level value is {}, expected a mapping", kind(&other)),
        }),
    }
}

/// What one merge pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePass {
    pub inserted: Vec<String>,
    /// Key already set, typically by an earlier placement in the same pass.
    pub present: Vec<String>,
    /// Placements whose path runs through a scalar or a sequence created by
    /// an earlier placement.
    pub blocked: Vec<String>,
}

impl MergePass {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty()
    }
}

/// Result of setting one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    /// The key holds a value that is kept.
    Present,
    /// A parent on the path is not a mapping.
    Blocked,
}

pub fn merge(document: &mut Mapping, placements: Vec<KeyPlacement>) -> MergePass {
    let mut pass = MergePass::default();
    for placement in placements {
        let fragment = placement.fragment;
        match insert(document, fragment.path.parts(), fragment.value, fragment.force) {
            Insertion::Inserted => pass.inserted.push(placement.id),
            Insertion::Present => pass.present.push(placement.id),
            Insertion::Blocked => pass.blocked.push(placement.id),
        }
    }
    pass
}

/// Set `path` to `value`, creating missing parents. Existing values are kept
/// unless `force` is set. Content is never replaced to make room for a
/// nested key.
pub fn insert(document: &mut Mapping, path: &[String], value: Value, force: bool) -> Insertion {
    let Some((leaf, parents)) = path.split_last() else {
        return Insertion::Blocked;
    };

    let mut current = document;
    for segment in parents {
        let slot = current
            .entry(Value::from(segment.as_str()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if slot.is_null() {
            *slot = Value::Mapping(Mapping::new());
        }
        match slot {
            Value::Mapping(inner) => current = inner,
            _ => return Insertion::Blocked,
        }
    }

    let key = Value::from(leaf.as_str());
    let keep = match current.get(&key) {
        Some(existing) => !force || existing == &value,
        None => false,
    };
    if keep {
        return Insertion::Present;
    }
    current.insert(key, value);
    Insertion::Inserted
}

/// Canonical rendering: sorted top-level keys, blank line between blocks.
pub fn render_document(document: &Mapping) -> Result<String, PatchError> {
    let mut entries: Vec<(String, &Value, &Value)> = document
        .iter()
        .map(|(key, value)| (key_text(key), key, value))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut blocks = Vec::with_capacity(entries.len());
    for (text, key, value) in entries {
        let mut single = Mapping::new();
        single.insert(key.clone(), value.clone());
        let block = serde_yaml::to_string(&single).map_err(|err| PatchError::Serialize {
            key: text,
            message: err.to_string(),
        })?;
        blocks.push(block);
    }

    Ok(blocks.join("\n"))
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
