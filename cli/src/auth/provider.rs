//! Identity providers a login can go through.

use serde::{Deserialize, Serialize};

/// Supported identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    GitHub,
    Google,
}

impl AuthProvider {
    /// Path segment the server uses for this provider.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AuthProvider {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "google" => Ok(Self::Google),
            _ => Err(format!("Unknown provider: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(AuthProvider::try_from("GitHub"), Ok(AuthProvider::GitHub));
        assert_eq!(AuthProvider::try_from("google"), Ok(AuthProvider::Google));
        assert!(AuthProvider::try_from("gitlab").is_err());
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&AuthProvider::GitHub).unwrap();
        assert_eq!(json, "\"github\"");
    }
}
