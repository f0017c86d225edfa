//! Text-mode patcher.
//!
//! Untouched lines are copied byte-for-byte, in order. Only substitution
//! targets change, and inserted lines appear at their resolved points.

use crate::engine::fragment::Substitution;
use crate::engine::locator::InsertionPoint;

/// Split on `\n`. A trailing newline does not produce an empty last line and
/// `\r` stays part of its line.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n').collect()
}

/// Join lines, terminating the last one with a newline.
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + 1).sum());
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out
}

/// What one pass over the lines did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinePass {
    pub lines: Vec<String>,
    /// Ids of insertions that were emitted.
    pub inserted: Vec<String>,
    /// Ids of substitutions that rewrote at least one line.
    pub rewritten: Vec<String>,
}

impl LinePass {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || !self.rewritten.is_empty()
    }
}

/// Apply insertions and substitutions in one pass over `lines`.
///
/// Insertion indices refer to the original sequence. Insertions sharing an
/// index keep their given order, and a synthesized anchor block identical to
/// the one just emitted at the same index is not repeated. Inserted lines go
/// through the substitutions too, so a later run finds nothing to rewrite.
pub fn apply<S: AsRef<str>>(
    lines: &[S],
    mut insertions: Vec<InsertionPoint>,
    substitutions: &[Substitution],
) -> LinePass {
    insertions.sort_by_key(|point| point.index);

    let extra: usize = insertions
        .iter()
        .map(|p| p.synthesized.len() + p.lines.len())
        .sum();
    let mut pass = LinePass {
        lines: Vec::with_capacity(lines.len() + extra),
        ..LinePass::default()
    };

    let mut pending = insertions.into_iter().peekable();
    for idx in 0..=lines.len() {
        let mut last_synthesized: Option<Vec<String>> = None;
        while let Some(point) = pending.next_if(|p| p.index <= idx) {
            if !point.synthesized.is_empty()
                && last_synthesized.as_ref() != Some(&point.synthesized)
            {
                for line in &point.synthesized {
                    pass.lines.push(rewrite_line(line, substitutions, &mut pass.rewritten));
                }
                last_synthesized = Some(point.synthesized);
            }
            for line in &point.lines {
                pass.lines.push(rewrite_line(line, substitutions, &mut pass.rewritten));
            }
            pass.inserted.push(point.id);
        }

        let Some(line) = lines.get(idx) else {
            break;
        };
        pass.lines.push(rewrite_line(line.as_ref(), substitutions, &mut pass.rewritten));
    }

    pass
}

fn rewrite_line(line: &str, substitutions: &[Substitution], rewritten: &mut Vec<String>) -> String {
    let mut current = line.to_string();
    for substitution in substitutions {
        if let Some(next) = substitution.rewrite(&current) {
            current = next;
            if !rewritten.iter().any(|id| id == &substitution.id) {
                rewritten.push(substitution.id.clone());
            }
        }
    }
    current
}
