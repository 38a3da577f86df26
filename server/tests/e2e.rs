//! End-to-end tests against a live router bound to an ephemeral port.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use hackforge_server::error::ApiResult;
use hackforge_server::issuer::DEV_BYPASS_VALUE;
use hackforge_server::provider::{CallbackProcessor, UnconfiguredProcessor};
use hackforge_server::redirect::RedirectState;
use hackforge_server::session::{MemorySessionStore, Session};
use hackforge_server::{router, ApiError, AppState, ServerConfig};
use hackforge_token::{decode_unverified, Origin};
use reqwest::header::{AUTHORIZATION, COOKIE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

const SECRET: &str = "e2e-secret-e2e-secret-e2e-secret-e2e";
const PUBLIC: &str = "https://forge.example.com";
const COOKIE_NAME: &str = "hackforge_session";

struct TestServer {
    base: String,
    sessions: Arc<MemorySessionStore>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn login(&self, session_id: &str, email: &str) -> String {
        self.sessions
            .insert(
                session_id,
                Session {
                    email: email.to_string(),
                    name: Some("Test User".to_string()),
                },
            )
            .await;
        format!("{COOKIE_NAME}={session_id}")
    }
}

/// Processor that accepts one known code and otherwise behaves like a real
/// integration would after a successful login.
struct StubProcessor;

#[async_trait]
impl CallbackProcessor for StubProcessor {
    async fn complete_login(&self, provider: &str, state: &RedirectState) -> Response {
        let body = format!(
            "completed {provider} -> {}",
            state.callback_url.as_deref().unwrap_or("")
        );
        body.into_response()
    }

    async fn exchange_code(
        &self,
        _provider: &str,
        code: &str,
        _state: Option<&str>,
    ) -> ApiResult<Session> {
        if code == "good-code" {
            Ok(Session {
                email: "listener@x.com".to_string(),
                name: None,
            })
        } else {
            Err(ApiError::Unauthenticated)
        }
    }
}

async fn spawn(dev_bypass_enabled: bool, processor: Arc<dyn CallbackProcessor>) -> TestServer {
    let config = ServerConfig {
        public_url: Url::parse(PUBLIC).unwrap(),
        token_secret: Some(SECRET.to_string()),
        dev_bypass_enabled,
        ..ServerConfig::default()
    };
    let sessions = Arc::new(MemorySessionStore::new(COOKIE_NAME));
    let state = AppState::new(config, sessions.clone(), processor).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(state))).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestServer {
        base: format!("http://{addr}"),
        sessions,
        client,
    }
}

async fn location(server: &TestServer, path: &str) -> Url {
    let resp = server.client.get(server.url(path)).send().await.unwrap();
    assert!(resp.status().is_redirection(), "expected redirect from {path}");
    let location = resp.headers()[LOCATION].to_str().unwrap();
    Url::parse(location).unwrap()
}

fn param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn health_reports_ok() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn cli_login_redirect_chain() {
    let server = spawn(false, Arc::new(StubProcessor)).await;

    // CLI sign-in starts the provider flow with a CLI-tagged callback.
    let signin = location(&server, "/api/auth/cli-signin/github").await;
    assert_eq!(signin.path(), "/api/auth/callback/github");
    assert_eq!(param(&signin, "error_uri").as_deref(), Some("cli"));

    // The provider calls back; the first hop goes to the relay with from_cli.
    let relay = location(
        &server,
        "/api/auth/callback/github?code=abc&state=xyz&error_uri=cli",
    )
    .await;
    assert_eq!(relay.path(), "/api/auth/relay/callback/github");
    assert_eq!(param(&relay, "code").as_deref(), Some("abc"));
    assert_eq!(param(&relay, "from_cli").as_deref(), Some("true"));

    // The relay returns to the canonical callback, marked and aimed at the CLI landing page.
    let relay_path = format!("{}?{}", relay.path(), relay.query().unwrap());
    let back = location(&server, &relay_path).await;
    assert_eq!(back.path(), "/api/auth/callback/github");
    assert_eq!(param(&back, "from_special").as_deref(), Some("true"));
    assert_eq!(
        param(&back, "callbackUrl").as_deref(),
        Some("https://forge.example.com/cli/login?auth=success")
    );

    // Marked callbacks go straight to the processor.
    let final_path = format!("{}?{}", back.path(), back.query().unwrap());
    let resp = server.client.get(server.url(&final_path)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.text().await.unwrap(),
        "completed github -> https://forge.example.com/cli/login?auth=success"
    );
}

#[tokio::test]
async fn browser_login_lands_on_root() {
    let server = spawn(false, Arc::new(StubProcessor)).await;

    let relay = location(&server, "/api/auth/callback/google?code=abc").await;
    assert_eq!(param(&relay, "from_cli"), None);

    let relay_path = format!("{}?{}", relay.path(), relay.query().unwrap());
    let back = location(&server, &relay_path).await;
    assert_eq!(
        param(&back, "callbackUrl").as_deref(),
        Some("https://forge.example.com/")
    );
}

#[tokio::test]
async fn malformed_marker_redirects_with_error() {
    let server = spawn(false, Arc::new(StubProcessor)).await;
    let target = location(&server, "/api/auth/callback/github?from_special=maybe").await;
    assert_eq!(target.path(), "/");
    assert_eq!(param(&target, "error").as_deref(), Some("callback_error"));
}

#[tokio::test]
async fn undecodable_provider_redirects_with_error() {
    let server = spawn(false, Arc::new(StubProcessor)).await;

    let target = location(&server, "/api/auth/callback/%FF?code=a").await;
    assert_eq!(target.path(), "/");
    assert_eq!(param(&target, "error").as_deref(), Some("callback_error"));

    let target = location(&server, "/api/auth/relay/callback/%FF?code=a").await;
    assert_eq!(target.path(), "/cli/login");
    assert_eq!(param(&target, "error").as_deref(), Some("relay_callback_error"));

    let target = location(&server, "/api/auth/cli-signin/%FF").await;
    assert_eq!(target.path(), "/cli/login");
    assert_eq!(param(&target, "error").as_deref(), Some("signin_error"));
}

#[tokio::test]
async fn unconfigured_processor_returns_not_implemented() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let resp = server
        .client
        .get(server.url("/api/auth/callback/github?code=abc&from_special=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn token_issuance_requires_session() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;

    let resp = server
        .client
        .post(server.url("/api/cli/token"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized - Please sign in first");
}

#[tokio::test]
async fn session_issues_credential_that_authenticates() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let cookie = server.login("abc123", "u@x.com").await;

    let body: Value = server
        .client
        .get(server.url("/api/cli/token"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let claims = decode_unverified(&token).unwrap();
    assert_eq!(claims.sub, "u@x.com");
    assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);

    let whoami: Value = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(whoami["email"], "u@x.com");
    assert_eq!(whoami["method"], "credential");
}

#[tokio::test]
async fn extended_credential_lasts_thirty_days() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let cookie = server.login("s30", "long@x.com").await;

    let body: Value = server
        .client
        .post(server.url("/api/cli/token"))
        .header(COOKIE, cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let claims = decode_unverified(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
}

#[tokio::test]
async fn whoami_with_session_cookie() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let cookie = server.login("web", "web@x.com").await;

    let whoami: Value = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header(COOKIE, cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(whoami["email"], "web@x.com");
    assert_eq!(whoami["method"], "session");
}

#[tokio::test]
async fn whoami_rejects_garbage_credential() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let resp = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header(AUTHORIZATION, "Bearer not.a.credential")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bypass_is_refused_when_disabled() {
    let server = spawn(false, Arc::new(UnconfiguredProcessor)).await;
    let resp = server
        .client
        .get(server.url(&format!("/api/cli/token?bypass={DEV_BYPASS_VALUE}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bypass_issues_dev_credential_when_enabled() {
    let server = spawn(true, Arc::new(UnconfiguredProcessor)).await;

    let body: Value = server
        .client
        .get(server.url(&format!("/api/cli/token?bypass={DEV_BYPASS_VALUE}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let claims = decode_unverified(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, "dev@example.com");
    assert_eq!(claims.origin, Some(Origin::DevBypass));

    // Any other value is not a bypass request.
    let resp = server
        .client
        .get(server.url("/api/cli/token?bypass=yes"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dev_mode_body_requests_bypass() {
    let server = spawn(true, Arc::new(UnconfiguredProcessor)).await;

    let resp = server
        .client
        .post(server.url("/api/auth/cli-token"))
        .json(&serde_json::json!({ "devMode": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .client
        .post(server.url("/api/auth/cli-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn code_exchange_issues_credential() {
    let server = spawn(false, Arc::new(StubProcessor)).await;

    let body: Value = server
        .client
        .post(server.url("/api/auth/callback/github"))
        .json(&serde_json::json!({ "code": "good-code", "state": "s" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let claims = decode_unverified(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, "listener@x.com");

    let resp = server
        .client
        .post(server.url("/api/auth/callback/github"))
        .json(&serde_json::json!({ "state": "s" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let server = spawn(true, Arc::new(StubProcessor)).await;

    let resp = server
        .client
        .get(server.url("/api/cli/token?bypass=a&bypass=b"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = server
        .client
        .post(server.url("/api/auth/callback/%FF"))
        .json(&serde_json::json!({ "code": "good-code", "state": "s" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}
