//! Per-user file locations.

use std::path::PathBuf;

use crate::error::{CliError, Result};

/// Directory and file names under the user's home for the credential.
const CREDENTIAL_DIR: &str = ".hackforge";
const CREDENTIAL_FILE: &str = "auth.json";

/// Overrides the credential file location.
pub const AUTH_FILE_ENV: &str = "HACKFORGE_AUTH_FILE";

/// Get the configuration directory for the hackforge CLI.
///
/// - Linux: `~/.config/hackforge`
/// - macOS: `~/Library/Application Support/hackforge`
/// - Windows: `%APPDATA%\hackforge`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| CliError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("hackforge"))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the credential file path: `$HACKFORGE_AUTH_FILE`, else `~/.hackforge/auth.json`.
pub fn credential_file() -> Result<PathBuf> {
    credential_file_from(|key| std::env::var_os(key).map(PathBuf::from))
}

fn credential_file_from<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    if let Some(path) = lookup(AUTH_FILE_ENV).filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Storage("Cannot determine home directory".to_string()))?;
    Ok(home.join(CREDENTIAL_DIR).join(CREDENTIAL_FILE))
}
