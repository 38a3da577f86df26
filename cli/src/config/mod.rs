//! Configuration management for the hackforge CLI.

pub mod paths;
pub mod settings;

pub use paths::{config_file, credential_file};
pub use settings::{ApiConfig, HackforgeConfig};

use std::path::Path;

use crate::error::Result;

/// Load configuration from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config() -> Result<HackforgeConfig> {
    let path = config_file()?;
    load_config_from(&path)
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist, returns default configuration.
pub fn load_config_from(path: &Path) -> Result<HackforgeConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(HackforgeConfig::default().with_env_overrides());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: HackforgeConfig = toml::from_str(&contents)?;

    Ok(config.with_env_overrides())
}
