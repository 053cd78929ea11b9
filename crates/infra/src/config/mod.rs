//! Scheduler and retry configuration
//!
//! Plain `serde` structs with defaults, loaded from TOML or JSON by
//! [`loader`]. Values are validated when they are turned into schedulers or
//! policy factories.

pub mod loader;
pub mod types;

pub use loader::{from_json_str, from_toml_str, load_from_file, probe_config_paths, CONFIG_PATH_ENV};
pub use types::{
    CronConfig, FixedFrequencyConfig, JitterConfig, RetryPolicyConfig, SchedulerDefinition,
    SchedulingConfig, TriggerConfig,
};

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} format: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Invalid { field: field.into(), message: message.into() }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
