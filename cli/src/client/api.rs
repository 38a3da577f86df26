//! Hackforge API client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::auth::{AuthProvider, CredentialSource, CredentialStore};
use crate::client::middleware::AuthMiddleware;
use crate::config::ApiConfig;
use crate::error::{CliError, Result};

/// Query value the server requires before it honours a development bypass.
const DEV_BYPASS_VALUE: &str = "dev-only-do-not-use-in-production";

/// The caller as the server sees it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// How the server identified the caller (`session` or `credential`).
    pub method: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct CodeExchange<'a> {
    code: &'a str,
    state: &'a str,
}

/// Main API client for communicating with the Hackforge server.
pub struct HackforgeApiClient {
    client: ClientWithMiddleware,
    /// Same stack without retries, for requests that must be sent once.
    once: ClientWithMiddleware,
    base_url: Url,
    credential: Arc<RwLock<Option<String>>>,
}

impl HackforgeApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let inner_client = Client::builder()
            .user_agent(format!("hackforge-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let credential: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(inner_client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(AuthMiddleware::new(Arc::clone(&credential)))
            .build();
        let once = ClientBuilder::new(inner_client)
            .with(AuthMiddleware::new(Arc::clone(&credential)))
            .build();

        Ok(Self {
            client,
            once,
            base_url: config.base_url.clone(),
            credential,
        })
    }

    /// Load the stored credential. Returns `true` if one was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential file exists but cannot be read.
    pub async fn load_credential(&self, store: &CredentialStore) -> Result<bool> {
        match store.load()? {
            Some(token) => {
                self.set_credential(token).await;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Use `token` for subsequent requests.
    pub async fn set_credential(&self, token: impl Into<String>) {
        *self.credential.write().await = Some(token.into());
    }

    /// Ask the server who the loaded credential belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Unauthorized`] if the server rejects the credential.
    pub async fn whoami(&self) -> Result<Identity> {
        let response = self
            .client
            .get(self.endpoint("/api/auth/whoami")?)
            .send()
            .await?;
        read_json(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Get the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl CredentialSource for HackforgeApiClient {
    async fn dev_credential(&self) -> Result<String> {
        let mut url = self.endpoint("/api/cli/token")?;
        url.query_pairs_mut().append_pair("bypass", DEV_BYPASS_VALUE);

        let response = self.once.get(url).send().await?;
        let body: TokenResponse = read_json(response).await?;
        Ok(body.token)
    }

    async fn exchange_code(&self, provider: AuthProvider, code: &str, state: &str) -> Result<String> {
        let url = self.endpoint(&format!("/api/auth/callback/{provider}"))?;
        let body = serde_json::to_string(&CodeExchange { code, state })?;

        // The authorization code is single-use; a retry could only fail.
        let response = self
            .once
            .post(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let body: TokenResponse = read_json(response).await?;
        Ok(body.token)
    }
}

/// Decode a successful response, or map the failure to a [`CliError`].
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| CliError::Serialization(e.to_string()));
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(CliError::Unauthorized),
        StatusCode::SERVICE_UNAVAILABLE => Err(CliError::ApiUnavailable),
        _ => {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text).map_or_else(
                |_| {
                    if text.is_empty() {
                        status.canonical_reason().unwrap_or("Unknown error").to_string()
                    } else {
                        text
                    }
                },
                |body| body.error,
            );
            Err(CliError::ApiError {
                status: status.as_u16(),
                message,
            })
        },
    }
}
