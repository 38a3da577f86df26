//! Seam to the identity-provider integration.
//!
//! Exchanging authorization codes with GitHub/Google and writing the
//! resulting browser session belong to the login subsystem, not to this
//! crate. The router calls into it through [`CallbackProcessor`].

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, ApiResult};
use crate::redirect::RedirectState;
use crate::session::Session;

/// The canonical provider-callback processor.
#[async_trait]
pub trait CallbackProcessor: Send + Sync {
    /// Finish a browser login for a callback that has already been relayed.
    ///
    /// Implementations establish the session and redirect to
    /// `state.callback_url`.
    async fn complete_login(&self, provider: &str, state: &RedirectState) -> Response;

    /// Trade an authorization code caught by a CLI listener for the identity
    /// it belongs to.
    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        state: Option<&str>,
    ) -> ApiResult<Session>;
}

/// Placeholder used when no provider integration is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredProcessor;

#[async_trait]
impl CallbackProcessor for UnconfiguredProcessor {
    async fn complete_login(&self, provider: &str, _state: &RedirectState) -> Response {
        tracing::warn!(provider, "provider callback reached but no provider integration is configured");
        ApiError::NotImplemented(format!("login with provider '{provider}'")).into_response()
    }

    async fn exchange_code(
        &self,
        provider: &str,
        _code: &str,
        _state: Option<&str>,
    ) -> ApiResult<Session> {
        tracing::warn!(provider, "code exchange requested but no provider integration is configured");
        Err(ApiError::NotImplemented(format!(
            "code exchange with provider '{provider}'"
        )))
    }
}
