//! HTTP client for the Hackforge server.

pub mod api;
pub mod middleware;

pub use api::{HackforgeApiClient, Identity};
