//! Arch Patcher: converge a fleet of projects on a multi-architecture build
//! policy by patching their CI pipelines, Dockerfiles and Helm values files.
//!
//! # Architecture
//!
//! The [`engine`] is a pure function from file content to patched content.
//! For every required fragment it asks the detector whether the fragment is
//! already there, asks the locator where a missing one belongs, and lets the
//! mode's patcher apply everything in a single pass:
//!
//! - **Line mode** (pipelines, Dockerfiles): untouched lines are preserved
//!   byte-for-byte and in order.
//! - **Structured mode** (values files): YAML is merged key by key and
//!   re-rendered canonically, top-level keys sorted.
//!
//! Everything around the engine (discovery, safety checks, atomic writes,
//! reports) lives in [`discovery`], [`safety`], [`runner`] and [`report`].
//!
//! # Guarantees
//!
//! - Idempotent: a second run over patched content reports no change
//! - Existing values are never overwritten unless a fragment opts in
//! - Unparseable structured input fails that file only
//! - Atomic file writes (tempfile + fsync + rename), permissions kept
//!
//! # Example
//!
//! ```
//! use arch_patcher::engine::{apply_patch_spec, LineFragment, LinePattern, PatchSpec};
//!
//! let spec = PatchSpec::Line {
//!     fragments: vec![LineFragment::after(
//!         "build-arch",
//!         "build_arch: amd64,arm64",
//!         LinePattern::Contains("with:".to_string()),
//!         vec!["      build_arch: amd64,arm64".to_string()],
//!     )],
//!     substitutions: Vec::new(),
//! };
//!
//! let outcome = apply_patch_spec(b"jobs:\n  build:\n    with:\n", &spec).unwrap();
//! assert!(outcome.changed);
//! assert!(outcome.content.ends_with("    with:\n      build_arch: amd64,arm64\n"));
//! ```

pub mod config;
pub mod discovery;
pub mod engine;
pub mod report;
pub mod runner;
pub mod safety;

// Re-exports
pub use config::{
    default_config, load_from_path, load_from_str, select_targets, ConfigError, MigratorConfig,
    TargetConfig,
};
pub use discovery::{discover, DiscoveryError, FileMatcher};
pub use engine::{
    apply_patch_spec, FragmentStatus, KeyFragment, KeyPath, LineFragment, LinePattern, Mode,
    PatchError, PatchOutcome, PatchSpec, Substitution,
};
pub use report::{ChangeReport, FileReport, TargetReport};
pub use runner::{patch_file, run_all, run_target, FileError, RunOptions};
pub use safety::{SafetyError, WorkspaceGuard};
