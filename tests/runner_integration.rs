//! End-to-end runs of the built-in policy over temporary project trees.

use arch_patcher::config::{default_config, load_from_str, select_targets};
use arch_patcher::discovery::DiscoveryError;
use arch_patcher::runner::{run_all, run_target, FileError, RunOptions};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PIPELINE: &str = "jobs:\n  pipeline:\n    uses: InDriver/base-workflows/.github/workflows/go_pipeline.yaml@main\n    with:\n      go_version: \"1.22\"\n";
const DOCKERFILE: &str = "FROM golang:1.22 AS builder\nRUN go build ./...\nFROM alpine:3.19\n";
const VALUES: &str = "replicaCount: 2\n";

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

/// A project with one file of each kind plus some decoys.
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, ".github/workflows/pipeline.yml", PIPELINE);
    write(root, ".github/workflows/lint.yml", "name: lint\n");
    write(root, "build/api/Dockerfile", DOCKERFILE);
    write(root, "build/worker/dockerfile", DOCKERFILE);
    write(root, "build/README.md", "FROM docs\n");
    write(root, "deployments/aws/api/values.yaml", VALUES);
    write(root, "deployments/gcp/values.yaml", VALUES);
    dir
}

#[test]
fn full_run_patches_every_kind() {
    let project = setup_project();
    let root = project.path();
    let config = default_config().unwrap();
    let targets = select_targets(&config, &[]).unwrap();

    let report = run_all(root, &targets, RunOptions::default());
    assert!(!report.has_failures());

    let order: Vec<&str> = report.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(order, vec!["docker", "values", "ci"]);
    assert_eq!(report.changed_paths().len(), 4);

    assert!(read(root, ".github/workflows/pipeline.yml").contains("      build_arch: amd64,arm64\n"));
    assert_eq!(read(root, ".github/workflows/lint.yml"), "name: lint\n");
    assert!(read(root, "build/api/Dockerfile").starts_with("FROM --platform=${TARGETPLATFORM} golang"));
    assert!(read(root, "build/worker/dockerfile").contains("FROM --platform=${TARGETPLATFORM} alpine"));
    assert_eq!(read(root, "build/README.md"), "FROM docs\n");
    assert!(read(root, "deployments/aws/api/values.yaml").contains("dedicated-to: multi-arch"));
    assert_eq!(read(root, "deployments/gcp/values.yaml"), VALUES);
}

#[test]
fn second_run_changes_nothing() {
    let project = setup_project();
    let root = project.path();
    let config = default_config().unwrap();
    let targets = select_targets(&config, &[]).unwrap();

    let first = run_all(root, &targets, RunOptions::default());
    assert!(!first.changed_paths().is_empty());
    let snapshot = read(root, "deployments/aws/api/values.yaml");

    let second = run_all(root, &targets, RunOptions::default());
    assert!(second.changed_paths().is_empty());
    for target in &second.targets {
        assert_eq!(target.to_string(), "No changes.\n");
        assert!(target.files.iter().all(|file| !file.written));
    }
    assert_eq!(read(root, "deployments/aws/api/values.yaml"), snapshot);
}

#[test]
fn dry_run_reports_without_writing() {
    let project = setup_project();
    let root = project.path();
    let config = default_config().unwrap();
    let targets = select_targets(&config, &["docker".to_string()]).unwrap();

    let report = run_all(root, &targets, RunOptions { dry_run: true });
    let docker = report.target("docker").unwrap();
    assert_eq!(docker.changed_paths().len(), 2);
    assert!(docker.to_string().starts_with("Changed files:\n"));
    assert_eq!(read(root, "build/api/Dockerfile"), DOCKERFILE);
}

#[test]
fn missing_directory_fails_target_but_not_run() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "build/Dockerfile", DOCKERFILE);

    let config = default_config().unwrap();
    let targets = select_targets(&config, &[]).unwrap();
    let report = run_all(root, &targets, RunOptions::default());

    assert!(report.has_failures());
    let failed: Vec<&str> = report
        .target_failures
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(failed, vec!["values", "ci"]);
    assert!(matches!(
        report.target_failures[0].1,
        DiscoveryError::MissingDirectory { .. }
    ));
    assert!(read(root, "build/Dockerfile").contains("--platform="));
}

#[test]
fn optional_target_is_skipped() {
    let config = load_from_str(
        r#"
[[targets]]
name = "docker"
subpath = "build"
required = false
match = { names = ["Dockerfile"] }

[targets.patch]
mode = "line"

[[targets.patch.substitutions]]
id = "platform"
when = { prefix = "FROM" }
unless_contains = "--platform="
find = "FROM"
replace = "FROM --platform=${TARGETPLATFORM}"
"#,
    )
    .unwrap();
    let dir = TempDir::new().unwrap();

    let report = run_target(dir.path(), &config.targets[0], RunOptions::default()).unwrap();
    assert!(report.skipped);
    assert!(report.files.is_empty());
}

#[test]
fn unparseable_values_file_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "deployments/aws/a/values.yaml", "image: {repository: x\n");
    write(root, "deployments/aws/b/values.yaml", VALUES);

    let config = default_config().unwrap();
    let report = run_target(root, config.target("values").unwrap(), RunOptions::default()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], FileError::Patch { .. }));
    assert!(report.failures[0].path().ends_with("a/values.yaml"));
    assert_eq!(read(root, "deployments/aws/a/values.yaml"), "image: {repository: x\n");

    assert_eq!(report.changed_paths().len(), 1);
    assert!(read(root, "deployments/aws/b/values.yaml").contains("tolerations:"));
}

#[test]
#[cfg(unix)]
fn symlink_escaping_root_is_refused() {
    use std::os::unix::fs::symlink;

    let dir = TempDir::new().unwrap();
    let root = dir.path().join("project");
    fs::create_dir_all(root.join("build")).unwrap();
    let outside = dir.path().join("Dockerfile");
    fs::write(&outside, DOCKERFILE).unwrap();
    symlink(&outside, root.join("build/Dockerfile")).unwrap();

    let config = default_config().unwrap();
    let report = run_target(&root, config.target("docker").unwrap(), RunOptions::default()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], FileError::Unsafe { .. }));
    assert_eq!(fs::read_to_string(&outside).unwrap(), DOCKERFILE);
}

#[test]
fn reported_paths_are_discovery_paths() {
    let project = setup_project();
    let root = project.path();
    let config = default_config().unwrap();

    let report = run_target(root, config.target("ci").unwrap(), RunOptions::default()).unwrap();
    assert_eq!(
        report.changed_paths(),
        vec![root.join(".github/workflows/pipeline.yml").as_path()]
    );
    assert_eq!(report.unchanged(), 0);
}
