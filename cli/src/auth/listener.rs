//! Ephemeral local listener for the browser login flow.
//!
//! Binds `127.0.0.1` on an OS-assigned port and waits for exactly one
//! callback carrying `code` and `state`. The first request to the callback
//! path decides the outcome, whether it succeeds or not. Later requests are
//! answered but change nothing. The listener shuts down once the outcome has
//! been collected, when the wait times out, or when it is dropped.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use oauth2::{AuthorizationCode, CsrfToken};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Url;

use crate::error::{CliError, Result};

/// Path the browser is sent back to.
pub const CALLBACK_PATH: &str = "/callback";

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Hackforge CLI login complete</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
               display: flex; justify-content: center; align-items: center;
               height: 100vh; margin: 0; background: #f5f5f5; color: #333; }
        .card { text-align: center; padding: 3rem; background: white; border-radius: 12px;
                box-shadow: 0 2px 10px rgba(0,0,0,0.08); }
        h1 { color: #22c55e; margin-bottom: 0.5rem; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Login complete</h1>
        <p>You can close this tab and return to your terminal.</p>
    </div>
</body>
</html>"#;

const FAILURE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Hackforge CLI login failed</title>
</head>
<body>
    <h1>Login failed</h1>
    <p>Return to your terminal for details, then run <code>hackforge auth login</code> again.</p>
</body>
</html>"#;

const ALREADY_HANDLED_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Hackforge CLI</title></head>
<body><p>This login has already been handled. You can close this tab.</p></body>
</html>"#;

struct ListenerState {
    expected_state: CsrfToken,
    outcome: Mutex<Option<oneshot::Sender<Result<AuthorizationCode>>>>,
}

/// A running callback listener.
pub struct CallbackListener {
    addr: SocketAddr,
    outcome_rx: oneshot::Receiver<Result<AuthorizationCode>>,
    shutdown_tx: oneshot::Sender<()>,
}

impl CallbackListener {
    /// Bind a fresh port and start accepting callbacks for `expected_state`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Io`] if no local port can be bound.
    pub async fn bind(expected_state: CsrfToken) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ListenerState {
            expected_state,
            outcome: Mutex::new(Some(outcome_tx)),
        });
        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(state);

        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(error = %e, "callback listener stopped with an error");
            }
            tracing::debug!("callback listener closed");
        });

        tracing::debug!(%addr, "callback listener bound");
        Ok(Self {
            addr,
            outcome_rx,
            shutdown_tx,
        })
    }

    /// Address the listener is bound to.
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL the browser must be redirected to.
    pub fn redirect_uri(&self) -> Result<Url> {
        Ok(Url::parse(&format!("http://{}{CALLBACK_PATH}", self.addr))?)
    }

    /// Wait for the first callback, or fail after `timeout`.
    ///
    /// # Errors
    ///
    /// - [`CliError::ListenerTimeout`] if no callback arrives in time.
    /// - [`CliError::ProviderCallback`] if the callback carries an `error`.
    /// - [`CliError::MissingCallbackParameter`] if `code` or `state` is absent.
    /// - [`CliError::StateMismatch`] if `state` is not the expected value.
    pub async fn wait(self, timeout: Duration) -> Result<AuthorizationCode> {
        let Self {
            outcome_rx,
            shutdown_tx,
            ..
        } = self;

        let outcome = tokio::time::timeout(timeout, outcome_rx).await;
        let _ = shutdown_tx.send(());

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CliError::Cancelled),
            Err(_) => Err(CliError::ListenerTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<ListenerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    let Some(sender) = state.outcome.lock().await.take() else {
        tracing::debug!("ignoring callback after login was already resolved");
        return (StatusCode::OK, Html(ALREADY_HANDLED_HTML));
    };

    let outcome = parse_callback(&params, &state.expected_state);
    let response = match &outcome {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_HTML)),
        Err(e) => {
            tracing::warn!(error = %e, "login callback rejected");
            (StatusCode::BAD_REQUEST, Html(FAILURE_HTML))
        },
    };

    let _ = sender.send(outcome);
    response
}

/// Validate callback query parameters against the expected state.
fn parse_callback(
    params: &HashMap<String, String>,
    expected_state: &CsrfToken,
) -> Result<AuthorizationCode> {
    if let Some(error) = params.get("error") {
        return Err(CliError::ProviderCallback {
            error: error.clone(),
            description: params.get("error_description").cloned(),
        });
    }

    let code = params
        .get("code")
        .filter(|c| !c.is_empty())
        .ok_or(CliError::MissingCallbackParameter("code"))?;
    let state = params
        .get("state")
        .filter(|s| !s.is_empty())
        .ok_or(CliError::MissingCallbackParameter("state"))?;

    if !constant_time_eq(state.as_bytes(), expected_state.secret().as_bytes()) {
        return Err(CliError::StateMismatch);
    }

    Ok(AuthorizationCode::new(code.clone()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn expected() -> CsrfToken {
        CsrfToken::new("expected-state".to_string())
    }

    #[test]
    fn accepts_code_with_matching_state() {
        let code = parse_callback(
            &params(&[("code", "abc"), ("state", "expected-state")]),
            &expected(),
        )
        .unwrap();
        assert_eq!(code.secret(), "abc");
    }

    #[test]
    fn provider_error_wins() {
        let err = parse_callback(
            &params(&[
                ("error", "access_denied"),
                ("error_description", "denied by user"),
                ("code", "abc"),
            ]),
            &expected(),
        )
        .unwrap_err();

        match err {
            CliError::ProviderCallback { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("denied by user"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_parameters_are_named() {
        let err = parse_callback(&params(&[("state", "expected-state")]), &expected()).unwrap_err();
        assert!(matches!(err, CliError::MissingCallbackParameter("code")));

        let err = parse_callback(&params(&[("code", "abc")]), &expected()).unwrap_err();
        assert!(matches!(err, CliError::MissingCallbackParameter("state")));
    }

    #[test]
    fn wrong_state_is_rejected() {
        let err = parse_callback(
            &params(&[("code", "abc"), ("state", "forged")]),
            &expected(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::StateMismatch));
    }

    #[tokio::test]
    async fn times_out_without_callback() {
        let listener = CallbackListener::bind(expected()).await.unwrap();
        let err = listener.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, CliError::ListenerTimeout { timeout_secs: 0 }));
    }

    #[tokio::test]
    async fn resolves_once_and_ignores_later_callbacks() {
        let listener = CallbackListener::bind(expected()).await.unwrap();
        let mut url = listener.redirect_uri().unwrap();
        url.set_query(Some("code=first&state=expected-state"));

        let first = reqwest::get(url.clone()).await.unwrap();
        assert_eq!(first.status(), reqwest::StatusCode::OK);
        assert!(first.text().await.unwrap().contains("Login complete"));

        url.set_query(Some("code=second&state=expected-state"));
        let second = reqwest::get(url).await.unwrap();
        assert!(second.text().await.unwrap().contains("already been handled"));

        let code = listener.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code.secret(), "first");
    }

    #[tokio::test]
    async fn provider_error_callback_fails_the_wait() {
        let listener = CallbackListener::bind(expected()).await.unwrap();
        let mut url = listener.redirect_uri().unwrap();
        url.set_query(Some("error=access_denied"));

        let resp = reqwest::get(url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let err = listener.wait(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CliError::ProviderCallback { .. }));
    }

    #[tokio::test]
    async fn redirect_uri_points_at_loopback() {
        let listener = CallbackListener::bind(expected()).await.unwrap();
        let uri = listener.redirect_uri().unwrap();
        assert_eq!(uri.host_str(), Some("127.0.0.1"));
        assert_eq!(uri.port(), Some(listener.local_addr().port()));
        assert_eq!(uri.path(), CALLBACK_PATH);
    }
}
