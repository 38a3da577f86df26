//! Command implementations.

pub mod auth;
pub mod completions;

pub use auth::{handle_login, handle_logout, handle_status, handle_token, handle_whoami};
pub use completions::handle_completions;
