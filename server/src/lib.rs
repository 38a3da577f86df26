//! Hackforge authentication bridge.
//!
//! Relays identity-provider callbacks so that one registered callback URL
//! serves both the web application and the command-line tool, mints signed
//! CLI credentials, and resolves the caller of every protected request from
//! either a browser session or a bearer credential.

pub mod config;
pub mod error;
pub mod issuer;
pub mod provider;
pub mod redirect;
pub mod resolver;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::{ApiError, ConfigError};
pub use state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/whoami", get(resolver::whoami))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            resolver::require_caller,
        ));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/auth/callback/{provider}",
            get(redirect::provider_callback).post(issuer::exchange_code),
        )
        .route(
            "/api/auth/relay/callback/{provider}",
            get(redirect::relay_callback),
        )
        .route(
            "/api/auth/cli-signin/{provider}",
            get(redirect::cli_signin_redirect),
        )
        .route("/api/auth/cli-token", post(issuer::post_auth_cli_token))
        .route(
            "/api/cli/token",
            get(issuer::get_cli_token).post(issuer::post_cli_token),
        )
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
