//! Read → patch → write for every discovered file of a target.

use crate::config::TargetConfig;
use crate::discovery::{discover, DiscoveryError};
use crate::engine::{apply_patch_spec, FragmentStatus, PatchError, PatchOutcome, PatchSpec};
use crate::report::{ChangeReport, FileReport, TargetReport};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute outcomes without writing anything back.
    pub dry_run: bool,
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to patch {}: {source}", .path.display())]
    Patch {
        path: PathBuf,
        #[source]
        source: PatchError,
    },

    #[error("refusing to touch {}: {source}", .path.display())]
    Unsafe {
        path: PathBuf,
        #[source]
        source: SafetyError,
    },
}

impl FileError {
    pub fn path(&self) -> &Path {
        match self {
            FileError::Read { path, .. }
            | FileError::Write { path, .. }
            | FileError::Patch { path, .. }
            | FileError::Unsafe { path, .. } => path,
        }
    }
}

/// Patch one file in place.
///
/// The file is only rewritten when the engine reports a change and
/// `options.dry_run` is off. The original permissions are kept.
pub fn patch_file(
    path: &Path,
    spec: &PatchSpec,
    options: RunOptions,
) -> Result<FileReport, FileError> {
    let bytes = fs::read(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let outcome: PatchOutcome =
        apply_patch_spec(&bytes, spec).map_err(|source| FileError::Patch {
            path: path.to_path_buf(),
            source,
        })?;

    for report in &outcome.fragments {
        match report.status {
            FragmentStatus::NoTarget => warn!(
                file = %path.display(),
                fragment = %report.id,
                "no insertion point found, fragment skipped"
            ),
            status => debug!(file = %path.display(), fragment = %report.id, %status),
        }
    }

    let mut written = false;
    if outcome.changed && !options.dry_run {
        atomic_write(path, outcome.content.as_bytes()).map_err(|source| FileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        written = true;
        info!(file = %path.display(), "file updated");
    }

    Ok(FileReport {
        path: path.to_path_buf(),
        original: String::from_utf8_lossy(&bytes).into_owned(),
        outcome,
        written,
    })
}

/// Run one target: discover its files under `root` and patch each of them.
///
/// A missing target directory fails the whole target (or skips it when the
/// target is optional). Per-file failures are collected in the report and do
/// not stop the remaining files.
pub fn run_target(
    root: &Path,
    target: &TargetConfig,
    options: RunOptions,
) -> Result<TargetReport, DiscoveryError> {
    let dir = root.join(&target.subpath);
    info!(target = %target.name, dir = %dir.display(), "updating target");

    if !dir.is_dir() && !target.required {
        info!(target = %target.name, dir = %dir.display(), "directory absent, target skipped");
        return Ok(TargetReport::skipped(&target.name, dir));
    }

    let files = discover(&dir, &target.matcher)?;
    let guard = WorkspaceGuard::new(root).map_err(|source| DiscoveryError::InvalidRoot {
        root: root.to_path_buf(),
        source,
    })?;

    let mut report = TargetReport::new(&target.name, dir);
    for path in files {
        let result = guard
            .validate_path(&path)
            .map_err(|source| FileError::Unsafe {
                path: path.clone(),
                source,
            })
            .and_then(|canonical| patch_file(&canonical, &target.patch, options))
            .map(|mut file| {
                file.path = path.clone();
                file
            });

        match result {
            Ok(file) => report.files.push(file),
            Err(err) => {
                warn!(target = %target.name, error = %err, "file skipped");
                report.failures.push(err);
            }
        }
    }

    info!(
        target = %target.name,
        changed = report.changed_paths().len(),
        failed = report.failures.len(),
        "target done"
    );
    Ok(report)
}

/// Run targets in order. A target that fails discovery is recorded and the
/// next one still runs.
pub fn run_all(root: &Path, targets: &[&TargetConfig], options: RunOptions) -> ChangeReport {
    let mut report = ChangeReport::default();
    for target in targets {
        match run_target(root, target, options) {
            Ok(target_report) => report.targets.push(target_report),
            Err(err) => {
                warn!(target = %target.name, error = %err, "target failed");
                report.target_failures.push((target.name.clone(), err));
            }
        }
    }
    report
}

/// Atomic file write: tempfile + fsync + rename, keeping the permissions of
/// the file being replaced.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        )
    })?;
    let permissions = fs::metadata(path)?.permissions();

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
