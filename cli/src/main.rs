//! Hackforge CLI
//!
//! Logs in to a Hackforge server through the browser, a local callback
//! listener, a pasted credential or the development bypass, and keeps the
//! resulting credential in `~/.hackforge/auth.json`.

mod auth;
mod cli;
mod client;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AuthCommands, Cli, Commands};
use crate::config::settings::env;
use crate::error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Quiet by default so command output stays readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(env::LOG_LEVEL).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        tracing::debug!(reauth = e.requires_reauth(), "command failed");
        eprintln!("Error: {e}");
        if e.is_retriable() {
            eprintln!("This may be temporary. Try again in a moment.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Auth { command } => {
            let config = config::load_config()?;
            match command {
                AuthCommands::Login(args) => cli::commands::handle_login(args, &config).await,
                AuthCommands::Token { token, yes } => cli::commands::handle_token(&token, yes),
                AuthCommands::Logout => cli::commands::handle_logout(),
                AuthCommands::Status => cli::commands::handle_status(&config),
                AuthCommands::Whoami => cli::commands::handle_whoami(&config).await,
            }
        },
        Commands::Completions { shell } => cli::commands::handle_completions(shell),
    }
}
