//! Command-line argument parsing.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::auth::AuthProvider;

/// Hackforge command-line client.
#[derive(Parser, Debug)]
#[command(name = "hackforge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage authentication.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    /// Follow shell-specific instructions to install.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Supported shells for completions.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

/// Authentication subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in to Hackforge.
    ///
    /// Without flags, opens the token page in your browser and asks you to
    /// paste the credential it shows.
    Login(LoginArgs),

    /// Save a credential you already have.
    Token {
        /// The credential to save.
        token: String,

        /// Save even if the value does not look like a credential.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Log out and remove the stored credential.
    Logout,

    /// Show the stored credential's details without contacting the server.
    Status,

    /// Ask the server who the stored credential belongs to.
    Whoami,
}

/// Options for `hackforge auth login`.
#[derive(Args, Debug, Default)]
pub struct LoginArgs {
    /// Save this credential directly.
    #[arg(long, conflicts_with_all = ["web", "listen", "dev"])]
    pub token: Option<String>,

    /// Use the browser flow and paste the credential (the default).
    #[arg(long, conflicts_with_all = ["listen", "dev"])]
    pub web: bool,

    /// Use the browser flow and catch the callback on a local port.
    #[arg(long, conflicts_with = "dev")]
    pub listen: bool,

    /// Request a development bypass credential. Insecure, never for production.
    #[arg(long)]
    pub dev: bool,

    /// Identity provider for --listen.
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Skip opening the browser automatically.
    #[arg(long)]
    pub no_browser: bool,
}

/// Provider argument for CLI.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    #[value(name = "github")]
    GitHub,
    Google,
}

impl From<ProviderArg> for AuthProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::GitHub => Self::GitHub,
            ProviderArg::Google => Self::Google,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("hackforge").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn login_defaults_to_paste_flow() {
        let cli = parse(&["auth", "login"]).unwrap();
        let Commands::Auth {
            command: AuthCommands::Login(args),
        } = cli.command
        else {
            panic!("expected auth login");
        };
        assert!(args.token.is_none());
        assert!(!args.web && !args.listen && !args.dev);
    }

    #[test]
    fn login_flags_conflict() {
        assert!(parse(&["auth", "login", "--token", "x", "--dev"]).is_err());
        assert!(parse(&["auth", "login", "--listen", "--dev"]).is_err());
        assert!(parse(&["auth", "login", "--listen", "--provider", "google"]).is_ok());
    }

    #[test]
    fn token_takes_positional_value() {
        let cli = parse(&["auth", "token", "abc.def", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Auth {
                command: AuthCommands::Token { ref token, yes: true }
            } if token == "abc.def"
        ));
    }

    #[test]
    fn completions_accept_powershell() {
        let cli = parse(&["completions", "powershell"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions {
                shell: ShellType::PowerShell
            }
        ));
        assert!(parse(&["completions", "power-shell"]).is_err());
    }
}
