//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::args::ShellType;
use crate::error::Result;

/// Handles the `hackforge completions` command.
pub fn handle_completions(shell: ShellType) -> Result<()> {
    let mut cmd = crate::cli::Cli::command();
    let shell = match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
        ShellType::PowerShell => Shell::PowerShell,
    };

    generate(shell, &mut cmd, "hackforge", &mut std::io::stdout());

    Ok(())
}
