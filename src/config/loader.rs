use crate::config::schema::{MigratorConfig, TargetConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    UnknownTarget {
        name: String,
        known: Vec<String>,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
            ConfigError::UnknownTarget { name, known } => {
                write!(
                    f,
                    "unknown target '{}' (known targets: {})",
                    name,
                    known.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::UnknownTarget { .. } => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<MigratorConfig, ConfigError> {
    let config: MigratorConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<MigratorConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents).map_err(|error| error.with_path(path))?;

    if let Some(root) = config.root.take() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.root = Some(if root.is_absolute() {
            root
        } else {
            base.join(root)
        });
    }

    Ok(config)
}

/// Targets named in `only`, in config order; every target when `only` is
/// empty.
pub fn select_targets<'a>(
    config: &'a MigratorConfig,
    only: &[String],
) -> Result<Vec<&'a TargetConfig>, ConfigError> {
    if only.is_empty() {
        return Ok(config.targets.iter().collect());
    }

    for name in only {
        if config.target(name).is_none() {
            return Err(ConfigError::UnknownTarget {
                name: name.clone(),
                known: config
                    .target_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }
    }

    Ok(config
        .targets
        .iter()
        .filter(|target| only.iter().any(|name| name == &target.name))
        .collect())
}
