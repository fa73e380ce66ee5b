//! ---
//! strata_section: "01-core-functionality"
//! strata_subsection: "module"
//! strata_type: "source"
//! strata_scope: "code"
//! strata_description: "Shared primitives for configuration and mode selection."
//! strata_version: "v0.0.0-prealpha"
//! strata_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::level::Level;
use crate::logging::LogFormat;
use crate::mode::{resolve_mode, Mode};

fn default_logging_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_prefix() -> String {
    "strata".to_owned()
}

fn default_production_retention_days() -> u32 {
    30
}

fn default_development_retention_days() -> u32 {
    7
}

fn default_diagnostic_max_files() -> usize {
    6
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_buffered_lines_limit() -> usize {
    128_000
}

fn default_lossy() -> bool {
    true
}

/// Errors raised while loading or validating logging configuration.
///
/// Any of these is fatal at startup: the process should abort before it
/// accepts work.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Syntax(#[from] toml::de::Error),
    #[error("invalid logging configuration: {0}")]
    Invalid(String),
    #[error("unable to prepare log destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Logging configuration, typically loaded from a TOML file.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Forces a mode regardless of the environment.
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Directory for rolling and hourly log files.
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Console rendering. When unset, production uses structured JSON and
    /// development uses the human-readable format.
    #[serde(default)]
    pub console_format: Option<LogFormat>,
    /// Overrides the per-mode minimum level for every sink.
    #[serde(default)]
    pub minimum_level: Option<Level>,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default = "default_shutdown_grace")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub shutdown_grace: Duration,
}

/// Metadata describing where a [`LoggingConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedLoggingConfig {
    pub config: LoggingConfig,
    /// `None` when no file was found and defaults apply.
    pub source: Option<PathBuf>,
}

impl LoggingConfig {
    pub const ENV_CONFIG_PATH: &str = "STRATA_CONFIG";

    /// Load configuration, respecting the `STRATA_CONFIG` override and
    /// falling back to defaults when no candidate exists.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, ConfigurationError> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(
        candidates: &[P],
    ) -> Result<LoadedLoggingConfig, ConfigurationError> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedLoggingConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedLoggingConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no logging configuration file found; using defaults");
        Ok(LoadedLoggingConfig {
            config: Self::default(),
            source: None,
        })
    }

    /// Read, parse and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        debug!(config_path = %path.display(), "loading logging configuration");
        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config =
            toml::from_str::<LoggingConfig>(&contents).map_err(|source| ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Mode to run in: the forced `mode` if configured, else the environment.
    pub fn effective_mode(&self, env: &HashMap<String, String>) -> Mode {
        self.mode.unwrap_or_else(|| resolve_mode(env))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let prefix = self.file_prefix.trim();
        if prefix.is_empty() {
            return Err(ConfigurationError::Invalid(
                "file_prefix must not be empty".into(),
            ));
        }
        if prefix.contains(&['/', '\\'][..]) {
            return Err(ConfigurationError::Invalid(format!(
                "file_prefix '{}' must not contain path separators",
                prefix
            )));
        }
        self.retention.validate()?;
        if self.queue.buffered_lines_limit == 0 {
            return Err(ConfigurationError::Invalid(
                "queue.buffered_lines_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            mode: None,
            directory: default_logging_directory(),
            file_prefix: default_file_prefix(),
            console_format: None,
            minimum_level: None,
            retention: RetentionConfig::default(),
            queue: QueueConfig::default(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl std::str::FromStr for LoggingConfig {
    type Err = ConfigurationError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: LoggingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Retention defaults per mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionConfig {
    #[serde(default = "default_production_retention_days")]
    pub production_days: u32,
    #[serde(default = "default_development_retention_days")]
    pub development_days: u32,
    /// Number of hourly files kept in diagnostic mode.
    #[serde(default = "default_diagnostic_max_files")]
    pub diagnostic_files: usize,
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.production_days == 0 || self.development_days == 0 {
            return Err(ConfigurationError::Invalid(
                "retention days must be at least one".into(),
            ));
        }
        if self.diagnostic_files == 0 {
            return Err(ConfigurationError::Invalid(
                "retention.diagnostic_files must be at least one".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            production_days: default_production_retention_days(),
            development_days: default_development_retention_days(),
            diagnostic_files: default_diagnostic_max_files(),
        }
    }
}

/// Background writer queue settings shared by all sinks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    #[serde(default = "default_buffered_lines_limit")]
    pub buffered_lines_limit: usize,
    /// Drop lines instead of blocking the caller when the queue is full.
    #[serde(default = "default_lossy")]
    pub lossy: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            buffered_lines_limit: default_buffered_lines_limit(),
            lossy: default_lossy(),
        }
    }
}
