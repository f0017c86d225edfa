//! Candidate file discovery under a target directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Selects files by exact name or by suffix of the file name.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FileMatcher {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl FileMatcher {
    pub fn names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn suffixes(suffixes: &[&str]) -> Self {
        Self {
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.suffixes.is_empty()
    }

    pub fn matches(&self, file_name: &str) -> bool {
        if self.case_insensitive {
            let lowered = file_name.to_lowercase();
            self.names.iter().any(|name| name.to_lowercase() == lowered)
                || self
                    .suffixes
                    .iter()
                    .any(|suffix| lowered.ends_with(&suffix.to_lowercase()))
        } else {
            self.names.iter().any(|name| name == file_name)
                || self
                    .suffixes
                    .iter()
                    .any(|suffix| file_name.ends_with(suffix.as_str()))
        }
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("directory {} not found", .dir.display())]
    MissingDirectory { dir: PathBuf },

    #[error("failed to walk {}: {source}", .dir.display())]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid root {}: {source}", .root.display())]
    InvalidRoot {
        root: PathBuf,
        #[source]
        source: crate::safety::SafetyError,
    },
}

/// Recursively collect matching files under `dir`, sorted by path.
///
/// Symlinks are returned as-is (not followed while walking); callers decide
/// whether their targets are acceptable.
pub fn discover(dir: &Path, matcher: &FileMatcher) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !dir.is_dir() {
        return Err(DiscoveryError::MissingDirectory {
            dir: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            dir: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if matcher.matches(name) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
