pub mod defaults;
pub mod loader;
pub mod schema;

pub use defaults::{default_config, DEFAULT_CONFIG};
pub use loader::{load_from_path, load_from_str, select_targets, ConfigError};
pub use schema::{MigratorConfig, TargetConfig, ValidationError, ValidationIssue};
