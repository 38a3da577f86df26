//! Login orchestration.
//!
//! A login runs in exactly one of four modes:
//!
//! - **Token**: a credential supplied on the command line is saved as is.
//! - **Browser paste**: the token page is opened and the person pastes the
//!   credential it shows.
//! - **Browser listener**: a [`CallbackListener`] catches the authorization
//!   code, which the server then trades for a credential.
//! - **Dev bypass**: the server issues a development credential directly.
//!
//! The credential store is written only after a credential has been obtained,
//! so a failed login leaves whatever was stored before untouched.

use std::io::{BufRead, Write};
use std::time::Duration;

use async_trait::async_trait;
use oauth2::CsrfToken;
use url::Url;

use crate::auth::listener::CallbackListener;
use crate::auth::{AuthProvider, CredentialStore};
use crate::error::{CliError, Result};

/// Page that shows a freshly issued credential to a signed-in browser.
pub const TOKEN_PAGE_PATH: &str = "/cli/login";

/// Server-side operations a login may need.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Request a development bypass credential.
    async fn dev_credential(&self) -> Result<String>;

    /// Trade an authorization code caught by the listener for a credential.
    async fn exchange_code(&self, provider: AuthProvider, code: &str, state: &str) -> Result<String>;
}

/// How to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMode {
    /// Save this credential directly.
    Token(String),
    /// Open the token page and read the pasted credential.
    BrowserPaste,
    /// Catch the provider callback on a local listener.
    BrowserListener(AuthProvider),
    /// Ask the server for a development credential.
    DevBypass,
}

type Launcher<'a> = Box<dyn Fn(&Url) -> bool + Send + Sync + 'a>;

/// Drives one login to completion.
pub struct LoginFlow<'a, S: CredentialSource + ?Sized> {
    source: &'a S,
    store: &'a CredentialStore,
    base_url: Url,
    listener_timeout: Duration,
    launcher: Launcher<'a>,
}

impl<'a, S: CredentialSource + ?Sized> LoginFlow<'a, S> {
    /// Create a flow that opens URLs in the system browser.
    pub fn new(
        source: &'a S,
        store: &'a CredentialStore,
        base_url: Url,
        listener_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            base_url,
            listener_timeout,
            launcher: Box::new(open_browser),
        }
    }

    /// Never open a browser; URLs are only printed.
    #[must_use]
    pub fn without_browser(self) -> Self {
        self.with_launcher(|_| false)
    }

    /// Replace how URLs are opened.
    #[must_use]
    pub fn with_launcher(mut self, launcher: impl Fn(&Url) -> bool + Send + Sync + 'a) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    /// Run the login and return the saved credential.
    ///
    /// `input` is only read in [`LoginMode::BrowserPaste`].
    pub async fn run(&self, mode: LoginMode, input: &mut dyn BufRead) -> Result<String> {
        tracing::debug!(?mode, "starting login");
        let token = match mode {
            LoginMode::Token(token) => token,
            LoginMode::BrowserPaste => self.paste(input)?,
            LoginMode::BrowserListener(provider) => self.listen(provider).await?,
            LoginMode::DevBypass => self.dev_bypass().await?,
        };

        self.store.save(&token)?;
        Ok(token)
    }

    fn paste(&self, input: &mut dyn BufRead) -> Result<String> {
        let url = self.base_url.join(TOKEN_PAGE_PATH)?;
        self.show(&url);

        println!();
        println!("Instructions:");
        println!("  1. Sign in with your account in the browser");
        println!("  2. Generate a CLI token");
        println!("  3. Copy the token shown on the page and paste it below");
        println!();
        print!("Token: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        let token = line.trim();
        if token.is_empty() {
            return Err(CliError::Cancelled);
        }
        Ok(token.to_string())
    }

    async fn listen(&self, provider: AuthProvider) -> Result<String> {
        let state = CsrfToken::new_random();
        let listener = CallbackListener::bind(state.clone()).await?;
        tracing::debug!(addr = %listener.local_addr(), %provider, "waiting for login callback");

        let url = listener_login_url(
            &self.base_url,
            provider,
            &listener.redirect_uri()?,
            state.secret(),
        )?;
        self.show(&url);

        println!();
        println!(
            "Waiting up to {}s for the browser to finish...",
            self.listener_timeout.as_secs()
        );
        let code = listener.wait(self.listener_timeout).await?;
        tracing::debug!(%provider, "authorization code received, exchanging");

        self.source
            .exchange_code(provider, code.secret(), state.secret())
            .await
    }

    async fn dev_bypass(&self) -> Result<String> {
        eprintln!();
        eprintln!("WARNING: development bypass login.");
        eprintln!("  The credential is issued without any sign-in and is NOT for production use.");
        eprintln!();
        tracing::warn!(server = %self.base_url, "requesting development bypass credential");

        self.source.dev_credential().await
    }

    fn show(&self, url: &Url) {
        if (self.launcher)(url) {
            println!("Browser opened. If nothing happened, visit:");
        } else {
            println!("Open this URL in your browser:");
        }
        println!();
        println!("  {url}");
    }
}

/// Token page URL that asks the web app to send the browser back to a local
/// listener.
pub fn listener_login_url(
    base_url: &Url,
    provider: AuthProvider,
    redirect_uri: &Url,
    state: &str,
) -> Result<Url> {
    let mut url = base_url.join(TOKEN_PAGE_PATH)?;
    url.query_pairs_mut()
        .append_pair("provider", provider.as_str())
        .append_pair("redirect_uri", redirect_uri.as_str())
        .append_pair("state", state);
    Ok(url)
}

/// Try to open `url` in the default browser.
pub fn open_browser(url: &Url) -> bool {
    match open::that(url.as_str()) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "could not open browser");
            false
        },
    }
}
