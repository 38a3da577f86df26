//! CLI credential issuance.
//!
//! Credentials are minted either from a live browser session or, when the
//! server is configured for it, through an explicit development bypass.
//! Every call mints a fresh credential; nothing is stored.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Duration;
use hackforge_token::{Origin, Subject, TokenCodec};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::session::Session;
use crate::state::AppState;

/// Exact query value that requests the development bypass.
pub const DEV_BYPASS_VALUE: &str = "dev-only-do-not-use-in-production";

/// Placeholder identity for bypass credentials.
pub const DEV_EMAIL: &str = "dev@example.com";
/// Placeholder display name for bypass credentials.
pub const DEV_NAME: &str = "Development User";

/// Lifetime of credentials shown to the user for pasting into the CLI.
pub fn standard_ttl() -> Duration {
    Duration::days(7)
}

/// Lifetime of credentials requested directly by an authenticated client.
pub fn extended_ttl() -> Duration {
    Duration::days(30)
}

/// Whether the caller asked for the development bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bypass {
    /// No bypass requested.
    NotRequested,
    /// Explicit opt-in received.
    Requested,
}

/// Mints bearer credentials.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    dev_bypass_enabled: bool,
}

impl TokenIssuer {
    /// Create an issuer around a configured codec.
    pub const fn new(codec: TokenCodec, dev_bypass_enabled: bool) -> Self {
        Self {
            codec,
            dev_bypass_enabled,
        }
    }

    /// The codec, for verification.
    pub const fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue a credential.
    ///
    /// A live session always wins. Without one, the bypass is honoured only
    /// if it was requested and the server allows it.
    pub fn issue(
        &self,
        session: Option<&Session>,
        bypass: Bypass,
        ttl: Duration,
    ) -> ApiResult<String> {
        let subject = match (session, bypass) {
            (Some(session), _) => Subject::from_session(&session.email, session.name.clone()),
            (None, Bypass::Requested) if self.dev_bypass_enabled => {
                tracing::warn!("issuing development bypass credential; not for production use");
                Subject {
                    email: DEV_EMAIL.to_string(),
                    name: Some(DEV_NAME.to_string()),
                    origin: Origin::DevBypass,
                }
            },
            (None, Bypass::Requested) => return Err(ApiError::DevBypassDisabled),
            (None, Bypass::NotRequested) => return Err(ApiError::Unauthenticated),
        };

        let token = self.codec.issue(&subject, ttl)?;
        tracing::info!(
            subject = %subject.email,
            origin = %subject.origin,
            ttl_days = ttl.num_days(),
            "issued CLI credential"
        );
        Ok(token)
    }
}

/// Body of a successful issuance.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The bearer credential.
    pub token: String,
}

/// Query of `GET /api/cli/token`.
#[derive(Debug, Default, Deserialize)]
pub struct BypassQuery {
    /// Must equal [`DEV_BYPASS_VALUE`] to request the bypass.
    pub bypass: Option<String>,
}

impl BypassQuery {
    fn bypass(&self) -> Bypass {
        if self.bypass.as_deref() == Some(DEV_BYPASS_VALUE) {
            Bypass::Requested
        } else {
            Bypass::NotRequested
        }
    }
}

/// Body of `POST /api/auth/cli-token`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevModeRequest {
    /// `true` requests the bypass.
    #[serde(default)]
    pub dev_mode: bool,
}

/// Body of `POST /api/auth/callback/{provider}`.
#[derive(Debug, Deserialize)]
pub struct CodeExchangeRequest {
    /// Authorization code caught by the CLI listener.
    #[serde(default)]
    pub code: Option<String>,
    /// State the CLI generated for the flow.
    #[serde(default)]
    pub state: Option<String>,
}

/// `GET /api/cli/token`: session or bypass query, 7-day credential.
pub async fn get_cli_token(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<BypassQuery>, QueryRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let bypass = query.bypass();
    let session = app.sessions.session(&headers).await;
    let token = app.issuer.issue(session.as_ref(), bypass, standard_ttl())?;
    Ok(Json(TokenResponse { token }))
}

/// `POST /api/auth/cli-token`: session or `{ "devMode": true }`, 7-day credential.
pub async fn post_auth_cli_token(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<TokenResponse>> {
    // An absent or unreadable body simply means no bypass.
    let request: DevModeRequest = serde_json::from_slice(&body).unwrap_or_default();
    let bypass = if request.dev_mode {
        Bypass::Requested
    } else {
        Bypass::NotRequested
    };

    let session = app.sessions.session(&headers).await;
    let token = app.issuer.issue(session.as_ref(), bypass, standard_ttl())?;
    Ok(Json(TokenResponse { token }))
}

/// `POST /api/cli/token`: session only, 30-day credential.
pub async fn post_cli_token(
    State(app): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let session = app.sessions.session(&headers).await;
    let token = app
        .issuer
        .issue(session.as_ref(), Bypass::NotRequested, extended_ttl())?;
    Ok(Json(TokenResponse { token }))
}

/// `POST /api/auth/callback/{provider}`: trade a listener-caught code for a credential.
pub async fn exchange_code(
    State(app): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> ApiResult<Json<TokenResponse>> {
    let Path(provider) = path.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request: CodeExchangeRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Request body must be JSON".to_string()))?;

    let code = request
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing code parameter".to_string()))?;

    let session = app
        .processor
        .exchange_code(&provider, &code, request.state.as_deref())
        .await?;

    let token = app
        .issuer
        .issue(Some(&session), Bypass::NotRequested, standard_ttl())?;
    Ok(Json(TokenResponse { token }))
}
