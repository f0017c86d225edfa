//! Aggregated results of a run: which files changed, which failed.

use crate::discovery::DiscoveryError;
use crate::engine::PatchOutcome;
use crate::runner::FileError;
use std::fmt;
use std::path::{Path, PathBuf};

/// One processed file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    /// Content before patching, kept for diff output.
    pub original: String,
    pub outcome: PatchOutcome,
    /// True when the file was rewritten on disk.
    pub written: bool,
}

impl FileReport {
    pub fn changed(&self) -> bool {
        self.outcome.changed
    }
}

#[derive(Debug)]
pub struct TargetReport {
    pub name: String,
    pub dir: PathBuf,
    /// Directory was absent and the target is optional.
    pub skipped: bool,
    pub files: Vec<FileReport>,
    pub failures: Vec<FileError>,
}

impl TargetReport {
    pub fn new(name: &str, dir: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            dir,
            skipped: false,
            files: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn skipped(name: &str, dir: PathBuf) -> Self {
        Self {
            skipped: true,
            ..Self::new(name, dir)
        }
    }

    /// Files whose content changed (or would change in a dry run), in
    /// discovery order.
    pub fn changed_paths(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|file| file.changed())
            .map(|file| file.path.as_path())
            .collect()
    }

    pub fn unchanged(&self) -> usize {
        self.files.iter().filter(|file| !file.changed()).count()
    }
}

impl fmt::Display for TargetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let changed = self.changed_paths();
        if changed.is_empty() {
            return writeln!(f, "No changes.");
        }
        writeln!(f, "Changed files:")?;
        for path in changed {
            writeln!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ChangeReport {
    pub targets: Vec<TargetReport>,
    /// Targets whose discovery failed, with the reason.
    pub target_failures: Vec<(String, DiscoveryError)>,
}

impl ChangeReport {
    /// All changed paths, target by target.
    pub fn changed_paths(&self) -> Vec<&Path> {
        self.targets
            .iter()
            .flat_map(|target| target.changed_paths())
            .collect()
    }

    pub fn file_failures(&self) -> usize {
        self.targets.iter().map(|target| target.failures.len()).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.target_failures.is_empty() || self.file_failures() > 0
    }

    pub fn target(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|target| target.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, changed: bool) -> FileReport {
        FileReport {
            path: PathBuf::from(path),
            original: String::new(),
            outcome: PatchOutcome {
                changed,
                content: String::new(),
                fragments: Vec::new(),
            },
            written: changed,
        }
    }

    #[test]
    fn target_report_lists_changed_files() {
        let mut report = TargetReport::new("ci", PathBuf::from(".github/workflows"));
        report.files.push(file("a/pipeline.yml", true));
        report.files.push(file("b/pipeline.yml", false));
        report.files.push(file("c/pipeline.yaml", true));

        assert_eq!(
            report.changed_paths(),
            vec![Path::new("a/pipeline.yml"), Path::new("c/pipeline.yaml")]
        );
        assert_eq!(report.unchanged(), 1);
        assert_eq!(
            report.to_string(),
            "Changed files:\na/pipeline.yml\nc/pipeline.yaml\n"
        );
    }

    #[test]
    fn empty_target_report_says_no_changes() {
        let report = TargetReport::new("docker", PathBuf::from("build"));
        assert_eq!(report.to_string(), "No changes.\n");
    }

    #[test]
    fn change_report_aggregates_targets() {
        let mut docker = TargetReport::new("docker", PathBuf::from("build"));
        docker.files.push(file("build/Dockerfile", true));
        let mut ci = TargetReport::new("ci", PathBuf::from(".github/workflows"));
        ci.files.push(file("pipeline.yml", true));

        let mut report = ChangeReport::default();
        report.targets.push(docker);
        report.targets.push(ci);
        report.target_failures.push((
            "values".to_string(),
            DiscoveryError::MissingDirectory {
                dir: PathBuf::from("deployments/aws"),
            },
        ));

        assert_eq!(
            report.changed_paths(),
            vec![Path::new("build/Dockerfile"), Path::new("pipeline.yml")]
        );
        assert!(report.has_failures());
        assert!(report.target("ci").is_some());
    }
}
