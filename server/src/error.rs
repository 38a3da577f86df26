//! Error types for the Hackforge server.
//!
//! Handlers return [`ApiError`], which renders as `{ "error": "<message>" }`
//! with a matching status code. Startup problems are [`ConfigError`]s.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No valid session or bearer credential accompanied the request.
    ///
    /// Credential verification failures collapse into this variant so the
    /// response never says why a credential was rejected.
    #[error("Unauthorized - Please sign in first")]
    Unauthenticated,

    /// The request was malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The development bypass was requested but is switched off.
    #[error("Development bypass is disabled on this server")]
    DevBypassDisabled,

    /// An external collaborator for this operation is not wired in.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Anything else. The detail is logged, never returned.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::DevBypassDisabled => StatusCode::FORBIDDEN,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(detail = %detail, "request failed");
        }

        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));

        (status, body).into_response()
    }
}

impl From<hackforge_token::TokenError> for ApiError {
    fn from(err: hackforge_token::TokenError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that stop the server from starting.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No token signing secret was provided.
    #[error("No token signing secret configured. Set HACKFORGE_TOKEN_SECRET (at least {min_len} bytes).")]
    MissingSecret {
        /// Minimum accepted secret length.
        min_len: usize,
    },

    /// The signing secret is too short to be safe.
    #[error("Token signing secret is too short: {len} bytes, need at least {min_len}.")]
    WeakSecret {
        /// Actual length.
        len: usize,
        /// Minimum accepted secret length.
        min_len: usize,
    },

    /// A configuration value could not be parsed.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// Failed to read the configuration file.
    #[error("Failed to read configuration file: {0}")]
    Read(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Read(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Read(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::DevBypassDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = ApiError::Internal("database password is hunter2".into());
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn token_errors_become_internal() {
        let err: ApiError = hackforge_token::TokenError::MissingSecret.into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn missing_secret_message_names_the_variable() {
        let err = ConfigError::MissingSecret { min_len: 32 };
        assert!(err.to_string().contains("HACKFORGE_TOKEN_SECRET"));
    }
}
