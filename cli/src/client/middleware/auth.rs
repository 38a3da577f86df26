//! Attaches the stored credential to outgoing requests.

use std::sync::Arc;

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tokio::sync::RwLock;

/// Middleware that sends `Authorization: Bearer <credential>` when a
/// credential is loaded. Requests go out unauthenticated otherwise.
pub struct AuthMiddleware {
    credential: Arc<RwLock<Option<String>>>,
}

impl AuthMiddleware {
    /// Create a new authentication middleware.
    #[must_use]
    pub const fn new(credential: Arc<RwLock<Option<String>>>) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if let Some(token) = self.credential.read().await.as_deref() {
            match format!("Bearer {token}").parse() {
                Ok(value) => {
                    req.headers_mut().insert(http::header::AUTHORIZATION, value);
                },
                Err(_) => tracing::warn!("stored credential is not a valid header value, sending request without it"),
            }
        }

        next.run(req, extensions).await
    }
}
