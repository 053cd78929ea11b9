//! Configuration loader
//!
//! Loads [`SchedulingConfig`] from a TOML or JSON file.
//!
//! ## File Locations
//! When no path is given the loader probes, in order:
//! 1. the path in `CADENCE_CONFIG`, if set
//! 2. `./cadence.toml`, `./cadence.json` (current working directory)
//! 3. `cadence.toml`, `cadence.json` next to the executable

use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ConfigResult, SchedulingConfig};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CADENCE_CONFIG";

/// Load and validate configuration from a file
///
/// If `path` is `None`, uses [`probe_config_paths`].
///
/// # Errors
/// Returns [`ConfigError`] if no file is found, it cannot be read, its
/// format is unsupported or invalid, or validation fails.
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<SchedulingConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound { path: p });
            }
            p
        }
        None => probe_config_paths()
            .ok_or_else(|| ConfigError::NotFound { path: PathBuf::from("cadence.toml") })?,
    };

    tracing::info!(path = %config_path.display(), "Loading scheduling configuration");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    tracing::debug!(schedulers = config.schedulers.len(), "Scheduling configuration loaded");
    Ok(config)
}

/// Parse and validate a TOML document
pub fn from_toml_str(contents: &str) -> ConfigResult<SchedulingConfig> {
    let config: SchedulingConfig = toml::from_str(contents)
        .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() })?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a JSON document
pub fn from_json_str(contents: &str) -> ConfigResult<SchedulingConfig> {
    let config: SchedulingConfig = serde_json::from_str(contents)
        .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() })?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration by file extension (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> ConfigResult<SchedulingConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() }),
        other => Err(ConfigError::UnsupportedFormat { extension: other.to_string() }),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        candidates.push(PathBuf::from(explicit));
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend([cwd.join("cadence.toml"), cwd.join("cadence.json")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend([exe_dir.join("cadence.toml"), exe_dir.join("cadence.json")]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}
