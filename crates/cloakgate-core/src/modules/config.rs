use std::fs;
use std::path::Path;
use validator::Validate;

use cloakgate_types::{CloakgateConfig, ConfigError};

pub const CONFIG_FILE: &str = "cloakgate.json";

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<CloakgateConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() });
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::from_read_error(&e))?;

    let config: CloakgateConfig = serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;
    config.validate().map_err(|e| ConfigError::from_validation(&e))?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> Result<CloakgateConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::NotFound { path }) => {
            tracing::info!(path = %path, "Config file not found, using defaults");
            Ok(CloakgateConfig::new())
        },
        other => other,
    }
}

/// Validate, then write atomically (temp file + rename).
pub fn save_config(path: &Path, config: &CloakgateConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::from_validation(&e))?;

    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::WriteError {
        message: format!("Failed to serialize config: {}", e),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::from_io_error(&e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Load (or default), apply `updater`, save, and return the result.
pub fn update_config<F>(path: &Path, updater: F) -> Result<CloakgateConfig, ConfigError>
where
    F: FnOnce(&mut CloakgateConfig),
{
    let mut config = load_or_default(path)?;
    updater(&mut config);
    save_config(path, &config)?;
    Ok(config)
}
