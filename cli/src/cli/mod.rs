//! CLI module for hackforge.

pub mod args;
pub mod commands;

pub use args::{AuthCommands, Cli, Commands, LoginArgs};
