//! Request authentication shared by every protected endpoint.
//!
//! A caller is identified by a browser session first, then by an
//! `Authorization: Bearer <credential>` header. Anything else is
//! [`ApiError::Unauthenticated`]. Whether the caller may touch a particular
//! resource is the endpoint's business, not the resolver's.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use hackforge_token::TokenCodec;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionProvider;
use crate::state::AppState;

/// How the caller was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Browser session cookie.
    Session,
    /// Bearer credential.
    Credential,
}

/// The identity behind one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedCaller {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// How the caller was identified.
    pub method: AuthMethod,
}

/// Parse Bearer token from Authorization header.
pub fn parse_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Identify the caller behind `headers`.
pub async fn resolve(
    sessions: &dyn SessionProvider,
    codec: &TokenCodec,
    headers: &HeaderMap,
) -> ApiResult<AuthenticatedCaller> {
    if let Some(session) = sessions.session(headers).await {
        return Ok(AuthenticatedCaller {
            email: session.email,
            name: session.name,
            method: AuthMethod::Session,
        });
    }

    let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_bearer_token)
    else {
        return Err(ApiError::Unauthenticated);
    };

    match codec.verify(token) {
        Ok(claims) => Ok(AuthenticatedCaller {
            email: claims.sub,
            name: claims.name,
            method: AuthMethod::Credential,
        }),
        Err(e) => {
            // Logged here, never reported to the caller.
            tracing::warn!(error = %e, "rejected bearer credential");
            Err(ApiError::Unauthenticated)
        },
    }
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Self>() {
            return Ok(caller.clone());
        }

        resolve(state.sessions.as_ref(), state.issuer.codec(), &parts.headers).await
    }
}

/// Middleware that rejects unauthenticated requests before the handler runs
/// and makes the caller available to it.
pub async fn require_caller(
    State(app): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = resolve(app.sessions.as_ref(), app.issuer.codec(), request.headers()).await?;
    tracing::debug!(caller = %caller.email, method = ?caller.method, "request authenticated");
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// `GET /api/auth/whoami`
pub async fn whoami(caller: AuthenticatedCaller) -> Json<AuthenticatedCaller> {
    Json(caller)
}
