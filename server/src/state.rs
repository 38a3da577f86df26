//! Shared application state.

use std::sync::Arc;

use hackforge_token::TokenCodec;

use crate::config::ServerConfig;
use crate::error::ConfigError;
use crate::issuer::TokenIssuer;
use crate::provider::CallbackProcessor;
use crate::session::SessionProvider;

/// State handed to every handler through `State<Arc<AppState>>`.
pub struct AppState {
    /// Validated configuration.
    pub config: ServerConfig,
    /// Credential issuer, holding the signing codec.
    pub issuer: TokenIssuer,
    /// Browser session lookup.
    pub sessions: Arc<dyn SessionProvider>,
    /// Identity provider integration.
    pub processor: Arc<dyn CallbackProcessor>,
}

impl AppState {
    /// Build state from a configuration and its collaborators.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not carry a usable signing secret.
    pub fn new(
        config: ServerConfig,
        sessions: Arc<dyn SessionProvider>,
        processor: Arc<dyn CallbackProcessor>,
    ) -> Result<Self, ConfigError> {
        let codec = TokenCodec::new(config.signing_secret()?).map_err(|e| {
            ConfigError::InvalidValue {
                key: "token_secret",
                message: e.to_string(),
            }
        })?;
        let issuer = TokenIssuer::new(codec, config.dev_bypass_enabled);

        Ok(Self {
            config,
            issuer,
            sessions,
            processor,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
