use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps writes inside the search root.
///
/// Discovery does not follow symlinks while walking, but a matching file can
/// itself be a symlink. Its target must stay under the root and outside
/// version-control metadata.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical search root
    root: PathBuf,
    /// Canonical paths that are never written
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("path is outside root: {} (root: {})", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is in forbidden directory: {} (forbidden: {})", .path.display(), .forbidden.display())]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard for `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;

        let forbidden_paths = [".git", ".hg", ".svn"]
            .iter()
            .filter_map(|dir| root.join(dir).canonicalize().ok())
            .collect();

        Ok(Self {
            root,
            forbidden_paths,
        })
    }

    /// Check that `path` may be rewritten; returns its canonical form.
    ///
    /// Relative paths are resolved against the root.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical.to_path_buf(),
                root: self.root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
