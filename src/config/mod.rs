use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::scoring::{validate_config, EngineConfig};

/// Get the config directory path (~/.config/notenbildung/)
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("notenbildung"))
}

/// Get the default config file path (~/.config/notenbildung/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Load the engine configuration from a YAML file
///
/// Without `path` the default file is read, and the built-in defaults apply
/// when it does not exist. An explicitly given file must exist.
///
/// # Errors
///
/// Returns an error if:
/// - The given config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
/// - A setting is out of range
pub fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    let config_path = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            path
        }
        None => {
            let default_path = get_config_path()?;
            if !default_path.exists() {
                tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                return Ok(EngineConfig::default());
            }
            default_path
        }
    };

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    let config: EngineConfig = serde_saphyr::from_str(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))?;

    if let Err(errors) = validate_config(&config) {
        anyhow::bail!(
            "Invalid config in {}:\n  - {}",
            config_path.display(),
            errors.join("\n  - ")
        );
    }

    Ok(config)
}
