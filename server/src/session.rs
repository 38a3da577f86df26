//! Read access to browser sessions.
//!
//! Sessions are owned by the browser login subsystem, which sets a cookie
//! after the identity provider callback completes. This crate only reads
//! them, through [`SessionProvider`].

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A provider-backed browser identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Email address, the unique identifier.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
}

/// Looks up the session attached to an inbound request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the live session for these request headers, if any.
    async fn session(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Session store keyed by the value of a session cookie.
///
/// Stands in for the external session subsystem in development and tests.
#[derive(Debug)]
pub struct MemorySessionStore {
    cookie_name: String,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store reading the cookie `cookie_name`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session under a cookie value.
    pub async fn insert(&self, session_id: impl Into<String>, session: Session) {
        self.sessions.write().await.insert(session_id.into(), session);
    }
}

#[async_trait]
impl SessionProvider for MemorySessionStore {
    async fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let jar = CookieJar::from_headers(headers);
        let session_id = jar.get(&self.cookie_name)?.value().to_string();
        self.sessions.read().await.get(&session_id).cloned()
    }
}
