//! Authentication command handlers.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use chrono::Utc;
use hackforge_token::{decode_unverified, Origin};

use crate::auth::{AuthProvider, CredentialStore, LoginFlow, LoginMode};
use crate::cli::LoginArgs;
use crate::client::HackforgeApiClient;
use crate::config::HackforgeConfig;
use crate::error::{CliError, Result};

/// Shortest string `auth token` accepts without asking.
const MIN_TOKEN_LEN: usize = 20;

/// Pick the login mode from the command-line flags.
fn login_mode(args: &LoginArgs, default_provider: AuthProvider) -> LoginMode {
    if let Some(token) = &args.token {
        LoginMode::Token(token.clone())
    } else if args.dev {
        LoginMode::DevBypass
    } else if args.listen {
        LoginMode::BrowserListener(args.provider.map_or(default_provider, Into::into))
    } else {
        LoginMode::BrowserPaste
    }
}

/// Handle the `hackforge auth login` command.
pub async fn handle_login(args: LoginArgs, config: &HackforgeConfig) -> Result<()> {
    println!("Hackforge authentication");
    println!();

    let mode = login_mode(&args, config.auth.default_provider);
    let store = CredentialStore::new()?;
    let client = HackforgeApiClient::new(&config.api)?;

    let mut flow = LoginFlow::new(
        &client,
        &store,
        config.api.base_url.clone(),
        Duration::from_secs(config.auth.listener_timeout_secs),
    );
    if args.no_browser {
        flow = flow.without_browser();
    }

    let token = flow.run(mode, &mut io::stdin().lock()).await?;

    println!();
    match decode_unverified(&token) {
        Some(claims) => println!("Logged in as {}.", claims.sub),
        None => println!("Credential saved."),
    }
    println!("Stored in {}", store.path().display());

    Ok(())
}

/// Loose check that a string could be a credential.
fn looks_like_credential(token: &str) -> bool {
    token.len() >= MIN_TOKEN_LEN && token.contains('.')
}

/// Handle the `hackforge auth token` command.
pub fn handle_token(token: &str, yes: bool) -> Result<()> {
    let store = CredentialStore::new()?;
    store_token(&store, token, yes, &mut io::stdin().lock())?;

    println!("Credential saved to {}", store.path().display());
    Ok(())
}

/// Save `token`, asking on `input` first if it looks wrong and `yes` is unset.
fn store_token(store: &CredentialStore, token: &str, yes: bool, input: &mut dyn BufRead) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CliError::Config("Token is required".to_string()));
    }

    if !yes && !looks_like_credential(token) {
        print!("This does not look like a Hackforge credential. Save it anyway? [y/N] ");
        io::stdout().flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;

        if !answer.trim().eq_ignore_ascii_case("y") {
            return Err(CliError::Cancelled);
        }
    }

    store.save(token)
}

/// Handle the `hackforge auth logout` command.
pub fn handle_logout() -> Result<()> {
    let store = CredentialStore::new()?;

    if store.clear()? {
        println!("Successfully logged out.");
    } else {
        println!("Not currently logged in.");
    }

    Ok(())
}

/// Handle the `hackforge auth status` command.
///
/// Reads the credential without verifying it. The server decides whether
/// it is actually accepted; see `auth whoami`.
pub fn handle_status(config: &HackforgeConfig) -> Result<()> {
    let store = CredentialStore::new()?;

    let Some(token) = store.load()? else {
        println!("Not logged in");
        println!();
        println!("Run 'hackforge auth login' to authenticate.");
        return Ok(());
    };

    println!("Logged in");
    println!();

    let Some(claims) = decode_unverified(&token) else {
        println!("  The stored credential could not be decoded.");
        println!("  Server:     {}", config.api.base_url);
        return Ok(());
    };

    println!("  Email:      {}", claims.sub);
    if let Some(name) = &claims.name {
        println!("  Name:       {name}");
    }
    if let Some(expires) = claims.expires_at() {
        println!("  Expires:    {}", expires.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("  Server:     {}", config.api.base_url);

    if claims.origin == Some(Origin::DevBypass) {
        println!();
        println!("  Warning: this is a development bypass credential.");
    }
    if claims.is_expired_at(Utc::now().timestamp()) {
        println!();
        println!("  Warning: the credential has expired. Run 'hackforge auth login' again.");
    }

    Ok(())
}

/// Handle the `hackforge auth whoami` command.
pub async fn handle_whoami(config: &HackforgeConfig) -> Result<()> {
    let store = CredentialStore::new()?;
    let client = HackforgeApiClient::new(&config.api)?;

    if !client.load_credential(&store).await? {
        return Err(CliError::NotAuthenticated);
    }

    let identity = client.whoami().await?;
    match &identity.name {
        Some(name) => println!("{name} <{}>", identity.email),
        None => println!("{}", identity.email),
    }
    tracing::debug!(method = %identity.method, server = %client.base_url(), "identity confirmed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::*;
    use crate::cli::args::ProviderArg;

    #[test]
    fn shape_check() {
        assert!(looks_like_credential("eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ1In0.sig"));
        assert!(!looks_like_credential("short.one"));
        assert!(!looks_like_credential("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn mode_selection() {
        let default = AuthProvider::GitHub;

        assert_eq!(login_mode(&LoginArgs::default(), default), LoginMode::BrowserPaste);

        let args = LoginArgs {
            web: true,
            ..LoginArgs::default()
        };
        assert_eq!(login_mode(&args, default), LoginMode::BrowserPaste);

        let args = LoginArgs {
            token: Some("abc".to_string()),
            ..LoginArgs::default()
        };
        assert_eq!(login_mode(&args, default), LoginMode::Token("abc".to_string()));

        let args = LoginArgs {
            dev: true,
            ..LoginArgs::default()
        };
        assert_eq!(login_mode(&args, default), LoginMode::DevBypass);

        let args = LoginArgs {
            listen: true,
            ..LoginArgs::default()
        };
        assert_eq!(
            login_mode(&args, AuthProvider::Google),
            LoginMode::BrowserListener(AuthProvider::Google)
        );

        let args = LoginArgs {
            listen: true,
            provider: Some(ProviderArg::GitHub),
            ..LoginArgs::default()
        };
        assert_eq!(
            login_mode(&args, AuthProvider::Google),
            LoginMode::BrowserListener(AuthProvider::GitHub)
        );
    }

    #[test]
    fn odd_token_saved_after_confirmation() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::with_path(dir.path().join("auth.json"));

        store_token(&store, "short", false, &mut Cursor::new("y\n")).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn odd_token_not_saved_when_declined() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::with_path(dir.path().join("auth.json"));

        let err = store_token(&store, "short", false, &mut Cursor::new("\n")).unwrap_err();
        assert!(matches!(err, CliError::Cancelled));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn well_formed_or_confirmed_token_skips_prompt() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::with_path(dir.path().join("auth.json"));

        // Empty input would decline if a prompt were shown.
        store_token(&store, "short", true, &mut Cursor::new("")).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("short"));

        let token = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ1In0.sig";
        store_token(&store, &format!("  {token}\n"), false, &mut Cursor::new("")).unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some(token));

        assert!(matches!(
            store_token(&store, "   ", true, &mut Cursor::new("")),
            Err(CliError::Config(_))
        ));
    }
}
