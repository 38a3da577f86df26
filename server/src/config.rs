//! Server configuration.
//!
//! Loaded once at startup from an optional TOML file, then overridden by
//! environment variables, then validated. The validated value is moved into
//! [`AppState`](crate::state::AppState); nothing reads the environment after
//! that.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Shortest signing secret accepted at startup.
pub const MIN_SECRET_LEN: usize = 32;

/// Environment variables that override the configuration file.
pub mod env {
    pub const LISTEN_ADDR: &str = "HACKFORGE_LISTEN_ADDR";
    pub const PUBLIC_URL: &str = "HACKFORGE_PUBLIC_URL";
    pub const TOKEN_SECRET: &str = "HACKFORGE_TOKEN_SECRET";
    pub const DEV_BYPASS: &str = "HACKFORGE_DEV_BYPASS";
    pub const SESSION_COOKIE: &str = "HACKFORGE_SESSION_COOKIE";
    pub const LOG_LEVEL: &str = "HACKFORGE_SERVER_LOG";
}

/// Main configuration for the server.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub listen_addr: SocketAddr,
    /// Externally visible origin, used to build absolute redirect URLs.
    pub public_url: Url,
    /// HMAC secret for bearer credentials. Required; there is no default.
    #[serde(skip_serializing)]
    pub token_secret: Option<String>,
    /// Whether the development bypass may issue credentials.
    pub dev_bypass_enabled: bool,
    /// Name of the browser session cookie.
    pub session_cookie: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            public_url: Url::parse("http://localhost:3000").expect("valid default URL"),
            token_secret: None,
            dev_bypass_enabled: false,
            session_cookie: "hackforge_session".to_string(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("public_url", &self.public_url.as_str())
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .field("dev_bypass_enabled", &self.dev_bypass_enabled)
            .field("session_cookie", &self.session_cookie)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from an optional TOML file plus the process environment.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, an override is malformed,
    /// or no usable signing secret is configured.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            },
            None => Self::default(),
        };

        let config = config.with_env_overrides_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn with_env_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(env::LISTEN_ADDR) {
            self.listen_addr = addr.parse().map_err(|e| ConfigError::InvalidValue {
                key: env::LISTEN_ADDR,
                message: format!("{e}"),
            })?;
        }

        if let Some(url) = lookup(env::PUBLIC_URL) {
            self.public_url = Url::parse(&url).map_err(|e| ConfigError::InvalidValue {
                key: env::PUBLIC_URL,
                message: e.to_string(),
            })?;
        }

        if let Some(secret) = lookup(env::TOKEN_SECRET) {
            self.token_secret = Some(secret);
        }

        if let Some(flag) = lookup(env::DEV_BYPASS) {
            self.dev_bypass_enabled = parse_flag(&flag).ok_or_else(|| ConfigError::InvalidValue {
                key: env::DEV_BYPASS,
                message: format!("expected true/false, got '{flag}'"),
            })?;
        }

        if let Some(cookie) = lookup(env::SESSION_COOKIE) {
            self.session_cookie = cookie;
        }

        Ok(self)
    }

    /// Check that the configuration can be used to start the server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signing_secret().map(|_| ())
    }

    /// The signing secret, if present and long enough.
    pub fn signing_secret(&self) -> Result<&str, ConfigError> {
        let secret = self
            .token_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret {
                min_len: MIN_SECRET_LEN,
            })?;

        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                len: secret.len(),
                min_len: MIN_SECRET_LEN,
            });
        }

        Ok(secret)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
