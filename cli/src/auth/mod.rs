//! Authentication for the hackforge CLI.
//!
//! Obtaining a credential ([`flow`]), catching browser callbacks locally
//! ([`listener`]) and keeping the credential on disk ([`credentials`]).

pub mod credentials;
pub mod flow;
pub mod listener;
pub mod provider;

pub use credentials::CredentialStore;
pub use flow::{CredentialSource, LoginFlow, LoginMode};
pub use provider::AuthProvider;
