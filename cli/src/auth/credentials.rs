//! Local credential storage.
//!
//! The credential lives in a single JSON file, `{ "token": "<credential>" }`,
//! by default at `~/.hackforge/auth.json`. A missing or unreadable-as-JSON
//! file simply means "not logged in".
//!
//! Writes go to a sibling temporary file that is then renamed over the real
//! one, so an interrupted save never leaves a half-written credential behind.
//! Concurrent CLI processes are not coordinated; the last writer wins.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::credential_file;
use crate::error::{CliError, Result};

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    token: String,
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store at the default per-user location.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Storage`] if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(credential_file()?))
    }

    /// Creates a store backed by an explicit file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves a credential, replacing any stored one.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Storage`] if the file cannot be written.
    pub fn save(&self, token: &str) -> Result<()> {
        let json = serde_json::to_vec(&StoredCredential {
            token: token.to_string(),
        })?;
        self.write_atomically(&json).map_err(|e| {
            CliError::Storage(format!("cannot write {}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Loads the stored credential.
    ///
    /// Returns `None` if no file exists or its contents are not a credential.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Storage`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<String>> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CliError::Storage(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            },
        };

        match serde_json::from_slice::<StoredCredential>(&contents) {
            Ok(stored) if !stored.token.is_empty() => Ok(Some(stored.token)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "ignoring unparsable credential file");
                Ok(None)
            },
        }
    }

    /// Removes the stored credential. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Storage`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CliError::Storage(format!(
                "cannot remove {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_atomically(&self, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let result = write_then_rename(&tmp, &self.path, contents);
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

fn write_then_rename(tmp: &Path, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    restrict_permissions(&file)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, target)
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}
