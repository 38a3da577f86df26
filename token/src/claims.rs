//! Claims carried inside a bearer credential.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Minted from an interactive browser session.
    Session,
    /// Minted through the development bypass. Never a real identity.
    DevBypass,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::DevBypass => write!(f, "dev-bypass"),
        }
    }
}

/// The identity a credential is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// Email address, the unique identifier of the caller.
    pub email: String,
    /// Display name, if the identity provider supplied one.
    pub name: Option<String>,
    /// How the credential is being obtained.
    pub origin: Origin,
}

impl Subject {
    /// Creates a subject for a session-backed identity.
    pub fn from_session(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
            origin: Origin::Session,
        }
    }
}

/// Signed claims payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier (email).
    pub sub: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Issued at (Unix timestamp, seconds).
    pub iat: i64,
    /// Expires at (Unix timestamp, seconds).
    pub exp: i64,
    /// Unique credential id; every issuance is distinct.
    pub jti: String,
    /// How the credential was obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl Claims {
    /// Builds claims for `subject`, valid for `ttl` from `now`.
    pub fn new(subject: &Subject, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: subject.email.clone(),
            name: subject.name.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            origin: Some(subject.origin),
        }
    }

    /// Issuance time.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    /// Expiry time.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// A credential is valid strictly before its expiry second.
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Origin::DevBypass).unwrap(),
            "\"dev-bypass\""
        );
        assert_eq!(serde_json::to_string(&Origin::Session).unwrap(), "\"session\"");
    }

    #[test]
    fn expiry_is_issuance_plus_ttl() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let subject = Subject::from_session("u@x.com", None);
        let claims = Claims::new(&subject, now, Duration::days(7));

        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert_eq!(claims.expires_at(), Some(now + Duration::days(7)));
    }

    #[test]
    fn expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let subject = Subject::from_session("u@x.com", None);
        let claims = Claims::new(&subject, now, Duration::seconds(10));

        assert!(!claims.is_expired_at(claims.exp - 1));
        assert!(claims.is_expired_at(claims.exp));
        assert!(claims.is_expired_at(claims.exp + 1));
    }

    #[test]
    fn each_issuance_gets_a_distinct_id() {
        let now = Utc::now();
        let subject = Subject::from_session("u@x.com", None);
        let a = Claims::new(&subject, now, Duration::days(1));
        let b = Claims::new(&subject, now, Duration::days(1));
        assert_ne!(a.jti, b.jti);
    }
}
