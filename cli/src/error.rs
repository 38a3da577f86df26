//! Error types and result aliases for the hackforge CLI.
//!
//! Every variant renders as a message a person can act on. Where logging in
//! again fixes the problem, the message says so.

use thiserror::Error;

/// Main error type for hackforge CLI operations.
///
/// Use [`requires_reauth`](Self::requires_reauth) and [`is_retriable`](Self::is_retriable)
/// to decide how to react to a failure.
#[derive(Error, Debug)]
pub enum CliError {
    /// No credential is stored.
    #[error("Not authenticated. Run 'hackforge auth login' to authenticate.")]
    NotAuthenticated,

    /// The server rejected the stored credential.
    #[error("The server rejected your credential (401). It may have expired. Run 'hackforge auth login' to re-authenticate.")]
    Unauthorized,

    /// The identity provider reported an error on the callback.
    #[error("Login failed at the identity provider: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    ProviderCallback {
        /// Value of the `error` parameter.
        error: String,
        /// Value of the `error_description` parameter, if any.
        description: Option<String>,
    },

    /// The callback arrived without a required parameter.
    #[error("Login callback was missing the '{0}' parameter. Run 'hackforge auth login' to try again.")]
    MissingCallbackParameter(&'static str),

    /// The callback's state did not match the one this CLI generated.
    #[error("Login callback state did not match this login attempt. Run 'hackforge auth login' to try again.")]
    StateMismatch,

    /// No callback reached the local listener in time.
    #[error("No login callback received within {timeout_secs} seconds. Run 'hackforge auth login' to try again.")]
    ListenerTimeout {
        /// How long the listener waited.
        timeout_secs: u64,
    },

    /// The credential file could not be read or written.
    #[error("Failed to access credential storage: {0}")]
    Storage(String),

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// API returned a non-success status code.
    #[error("API request failed ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network error during HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// Request timed out.
    #[error("Request timed out. The server may be slow or unreachable. Try again later.")]
    Timeout,

    /// API server is unreachable (503 or connection failed).
    #[error("Hackforge server is unavailable. Check HACKFORGE_API_URL and your network connection.")]
    ApiUnavailable,

    /// JSON or TOML serialization/deserialization failed.
    #[error("Data serialization error: {0}")]
    Serialization(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The user aborted an interactive step.
    #[error("Cancelled.")]
    Cancelled,
}

impl CliError {
    /// Checks if this error can be resolved by logging in again.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::Unauthorized
                | Self::ProviderCallback { .. }
                | Self::MissingCallbackParameter(_)
                | Self::StateMismatch
                | Self::ListenerTimeout { .. }
        )
    }

    /// Checks if this error is transient and the operation might succeed on retry.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout | Self::ApiUnavailable)
    }
}

/// Result type alias using [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML parse error: {err}"))
    }
}

impl From<reqwest::Error> for CliError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ApiUnavailable
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for CliError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Network(e.to_string()),
        }
    }
}
