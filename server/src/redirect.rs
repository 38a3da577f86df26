//! Provider callback relay.
//!
//! The identity provider calls back to one fixed URL,
//! `/api/auth/callback/{provider}`. A first-time callback is bounced through
//! `/api/auth/relay/callback/{provider}`, which decides the post-login
//! destination (browser landing page or CLI landing page) and sends the
//! request back to the canonical callback with the loop marker set. A
//! callback carrying the loop marker is never bounced again; it goes straight
//! to the [`CallbackProcessor`](crate::provider::CallbackProcessor).
//!
//! Every failure here ends in a redirect to a page the browser can show.

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, RawQuery, State};
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;
use url::Url;

use crate::state::AppState;

/// Marker set by the first hop when the login was started by the CLI.
pub const FROM_CLI: &str = "from_cli";
/// Loop-prevention marker set by the relay hop.
pub const FROM_RELAY: &str = "from_special";
/// Post-login destination understood by the callback processor.
pub const CALLBACK_URL: &str = "callbackUrl";
/// Parameter the CLI sign-in initiator uses to tag the flow.
pub const ERROR_URI: &str = "error_uri";
/// Value of [`ERROR_URI`] that marks a CLI-origin flow.
pub const CLI_ORIGIN_MARKER: &str = "cli";

/// Page the CLI flow lands on after login.
pub const CLI_LANDING_PATH: &str = "/cli/login";

const CALLBACK_SEGMENTS: &[&str] = &["api", "auth", "callback"];
const RELAY_SEGMENTS: &[&str] = &["api", "auth", "relay", "callback"];

/// Errors while parsing callback state or building redirect URLs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RedirectError {
    /// A marker carried something other than `true`/`false`.
    #[error("invalid value '{value}' for marker '{key}'")]
    InvalidMarker {
        /// Marker name.
        key: &'static str,
        /// Value received.
        value: String,
    },

    /// The provider name cannot be used as a path segment.
    #[error("invalid provider name '{0}'")]
    InvalidProvider(String),

    /// The configured public URL cannot carry a path.
    #[error("public URL cannot be used as a base")]
    CannotBeABase,

    /// URL parsing failed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Callback state carried entirely in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectState {
    /// Every received parameter except [`FROM_CLI`] and [`FROM_RELAY`], in
    /// arrival order.
    pub params: Vec<(String, String)>,
    /// The loop-prevention marker was present.
    pub relayed: bool,
    /// The CLI-origin marker was present.
    pub from_cli: bool,
    /// Requested post-login destination, if any.
    pub callback_url: Option<String>,
    /// Value of the `error_uri` parameter, if any.
    pub error_uri: Option<String>,
}

impl RedirectState {
    /// Parse a raw query string.
    pub fn from_query(query: Option<&str>) -> Result<Self, RedirectError> {
        let query = query.unwrap_or_default();
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// Build state from decoded key/value pairs. No provider keys are assumed.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, RedirectError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut state = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                FROM_RELAY => state.relayed |= parse_marker(FROM_RELAY, &value)?,
                FROM_CLI => state.from_cli |= parse_marker(FROM_CLI, &value)?,
                _ => {
                    if key == CALLBACK_URL {
                        state.callback_url = Some(value.clone());
                    } else if key == ERROR_URI {
                        state.error_uri = Some(value.clone());
                    }
                    state.params.push((key, value));
                },
            }
        }

        Ok(state)
    }

    /// Whether this login chain was started by the CLI.
    pub fn is_cli_origin(&self) -> bool {
        self.from_cli || self.error_uri.as_deref() == Some(CLI_ORIGIN_MARKER)
    }

    /// Look up a forwarded provider parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_marker(key: &'static str, value: &str) -> Result<bool, RedirectError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(RedirectError::InvalidMarker {
            key,
            value: value.to_string(),
        }),
    }
}

/// What to do with an inbound provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Already relayed; hand it to the callback processor.
    PassThrough(RedirectState),
    /// Bounce through the relay hop.
    Relay(Url),
}

/// Decide whether a provider callback must be bounced through the relay.
pub fn intercept(
    public_url: &Url,
    provider: &str,
    state: RedirectState,
) -> Result<Interception, RedirectError> {
    if state.relayed {
        return Ok(Interception::PassThrough(state));
    }

    let mut pairs = state.params.clone();
    if state.is_cli_origin() {
        pairs.push((FROM_CLI.to_string(), "true".to_string()));
    }

    let url = endpoint(public_url, RELAY_SEGMENTS, provider, &pairs)?;
    Ok(Interception::Relay(url))
}

/// Build the canonical callback URL for the second pass.
///
/// Drops the CLI marker, forwards every other parameter, replaces the
/// post-login destination and sets the loop marker.
pub fn relay(public_url: &Url, provider: &str, state: &RedirectState) -> Result<Url, RedirectError> {
    let destination = post_login_destination(public_url, state.is_cli_origin())?;

    let mut pairs: Vec<(String, String)> = state
        .params
        .iter()
        .filter(|(key, _)| key != CALLBACK_URL)
        .cloned()
        .collect();
    pairs.push((CALLBACK_URL.to_string(), destination.into()));
    pairs.push((FROM_RELAY.to_string(), "true".to_string()));

    endpoint(public_url, CALLBACK_SEGMENTS, provider, &pairs)
}

/// Build the provider callback URL a CLI-initiated login starts from.
pub fn cli_signin(public_url: &Url, provider: &str) -> Result<Url, RedirectError> {
    let destination = post_login_destination(public_url, true)?;
    let pairs = [
        (CALLBACK_URL.to_string(), destination.into()),
        (ERROR_URI.to_string(), CLI_ORIGIN_MARKER.to_string()),
    ];
    endpoint(public_url, CALLBACK_SEGMENTS, provider, &pairs)
}

/// Where the browser goes once login completes.
pub fn post_login_destination(public_url: &Url, cli_origin: bool) -> Result<Url, RedirectError> {
    if cli_origin {
        let mut url = public_url.join(CLI_LANDING_PATH)?;
        url.query_pairs_mut().append_pair("auth", "success");
        Ok(url)
    } else {
        Ok(public_url.join("/")?)
    }
}

fn endpoint(
    public_url: &Url,
    prefix: &[&str],
    provider: &str,
    pairs: &[(String, String)],
) -> Result<Url, RedirectError> {
    if provider.is_empty() || provider.contains('/') {
        return Err(RedirectError::InvalidProvider(provider.to_string()));
    }

    let mut url = public_url.clone();
    url.set_fragment(None);
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| RedirectError::CannotBeABase)?
        .clear()
        .extend(prefix)
        .push(provider);

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}

/// Redirect to `path?error=<code>` on the public origin, or relative to the
/// current host if the origin itself is unusable.
fn error_redirect(public_url: &Url, path: &str, code: &str) -> Response {
    let target = public_url.join(path).map_or_else(
        |_| format!("{path}?error={code}"),
        |mut url| {
            url.query_pairs_mut().append_pair("error", code);
            url.into()
        },
    );
    Redirect::to(&target).into_response()
}

/// Provider segment of the request path.
///
/// A segment axum cannot decode is reported like any other unusable
/// provider name, so the handlers still answer with a redirect.
fn provider_segment(path: Result<Path<String>, PathRejection>) -> Result<String, RedirectError> {
    path.map(|Path(provider)| provider)
        .map_err(|rejection| RedirectError::InvalidProvider(rejection.body_text()))
}

/// `GET /api/auth/callback/{provider}`
pub async fn provider_callback(
    State(app): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    RawQuery(query): RawQuery,
) -> Response {
    let public_url = &app.config.public_url;
    let outcome = provider_segment(path).and_then(|provider| {
        let state = RedirectState::from_query(query.as_deref())?;
        intercept(public_url, &provider, state).map(|interception| (provider, interception))
    });

    match outcome {
        Ok((provider, Interception::PassThrough(state))) => {
            tracing::debug!(provider = %provider, "callback already relayed, completing login");
            app.processor.complete_login(&provider, &state).await
        },
        Ok((provider, Interception::Relay(url))) => {
            tracing::debug!(provider = %provider, "relaying provider callback");
            Redirect::to(url.as_str()).into_response()
        },
        Err(e) => {
            tracing::warn!(error = %e, "provider callback could not be relayed");
            error_redirect(public_url, "/", "callback_error")
        },
    }
}

/// `GET /api/auth/relay/callback/{provider}`
pub async fn relay_callback(
    State(app): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    RawQuery(query): RawQuery,
) -> Response {
    let public_url = &app.config.public_url;
    let outcome = provider_segment(path).and_then(|provider| {
        let state = RedirectState::from_query(query.as_deref())?;
        let url = relay(public_url, &provider, &state)?;
        Ok((provider, state, url))
    });

    match outcome {
        Ok((provider, state, url)) => {
            tracing::debug!(
                provider = %provider,
                cli = state.is_cli_origin(),
                "returning relayed callback to canonical endpoint"
            );
            Redirect::to(url.as_str()).into_response()
        },
        Err(e) => {
            tracing::warn!(error = %e, "relay hop failed");
            error_redirect(public_url, CLI_LANDING_PATH, "relay_callback_error")
        },
    }
}

/// `GET /api/auth/cli-signin/{provider}`
pub async fn cli_signin_redirect(
    State(app): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let public_url = &app.config.public_url;
    match provider_segment(path).and_then(|provider| cli_signin(public_url, &provider)) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "CLI sign-in could not be started");
            error_redirect(public_url, CLI_LANDING_PATH, "signin_error")
        },
    }
}
