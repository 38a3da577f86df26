//! HMAC-signed credential codec.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{Claims, Subject};
use crate::error::{Result, TokenError};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Issues and verifies signed bearer credentials.
///
/// The signing secret is supplied at construction time. There is no fallback
/// secret: an empty secret is rejected with [`TokenError::MissingSecret`].
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec from a signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingSecret`] if `secret` is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        // Expiry is checked against an explicit clock in `verify_at`.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Issues a credential for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: &Subject, ttl: Duration) -> Result<String> {
        self.issue_at(subject, ttl, Utc::now())
    }

    /// Issues a credential as if the current time were `now`.
    pub fn issue_at(&self, subject: &Subject, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims::new(subject, now, ttl);
        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verifies a credential's signature and expiry and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a credential against the clock value `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if data.claims.is_expired_at(now.timestamp()) {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

/// Decodes a credential's claims without checking its signature or expiry.
///
/// For display only ("logged in as ..."). The result must never be used to
/// decide whether a caller is authenticated.
pub fn decode_unverified(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(ALGORITHM);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "credential could not be decoded for display");
            None
        }
    }
}
