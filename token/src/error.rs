//! Error types for credential encoding and verification.

use thiserror::Error;

/// Errors produced by the credential codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No signing secret was configured.
    #[error("No signing secret configured. Set a non-empty secret before issuing or verifying credentials.")]
    MissingSecret,

    /// The credential was not signed with the configured secret.
    #[error("Credential signature is invalid")]
    InvalidSignature,

    /// The credential is past its expiry time.
    #[error("Credential has expired")]
    Expired,

    /// The credential could not be parsed.
    #[error("Malformed credential: {0}")]
    Malformed(String),

    /// The claims could not be signed.
    #[error("Failed to encode credential: {0}")]
    Encoding(String),
}

/// Result type alias using [`TokenError`].
pub type Result<T> = std::result::Result<T, TokenError>;

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_errors_map_to_invalid_signature() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidSignature,
        );
        assert_eq!(TokenError::from(err), TokenError::InvalidSignature);
    }

    #[test]
    fn other_errors_map_to_malformed() {
        let err = jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken);
        assert!(matches!(TokenError::from(err), TokenError::Malformed(_)));
    }
}
