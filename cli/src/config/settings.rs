//! Application configuration settings.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::AuthProvider;

/// Main configuration for the hackforge CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HackforgeConfig {
    /// Authentication settings.
    pub auth: AuthConfig,
    /// API client settings.
    pub api: ApiConfig,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Provider used by `auth login --listen` when none is given.
    pub default_provider: AuthProvider,
    /// How long the local callback listener waits, in seconds.
    pub listener_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_provider: AuthProvider::GitHub,
            listener_timeout_secs: 120,
        }
    }
}

/// API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Hackforge server base URL.
    #[serde(with = "url_serde")]
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient failures.
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:3000").expect("valid default URL"),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

mod url_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use url::Url;

    pub fn serialize<S>(url: &Url, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(url.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const API_URL: &str = "HACKFORGE_API_URL";
    pub const AUTH_PROVIDER: &str = "HACKFORGE_AUTH_PROVIDER";
    pub const LOG_LEVEL: &str = "HACKFORGE_LOG";
}

impl HackforgeConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparsable values are ignored.
    #[must_use]
    pub fn with_env_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env::API_URL) {
            match Url::parse(&url) {
                Ok(parsed) => self.api.base_url = parsed,
                Err(e) => tracing::warn!(value = %url, error = %e, "ignoring invalid {}", env::API_URL),
            }
        }

        if let Some(provider) = lookup(env::AUTH_PROVIDER) {
            if let Ok(p) = AuthProvider::try_from(provider.as_str()) {
                self.auth.default_provider = p;
            }
        }

        self
    }
}
