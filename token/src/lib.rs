//! Signed, time-limited bearer credentials for Hackforge.
//!
//! The server issues credentials with [`TokenCodec::issue`] and checks them
//! with [`TokenCodec::verify`]. The CLI never holds the secret; it only uses
//! [`decode_unverified`] to show who a stored credential belongs to.

pub mod claims;
pub mod codec;
pub mod error;

pub use claims::{Claims, Origin, Subject};
pub use codec::{decode_unverified, TokenCodec};
pub use error::{Result, TokenError};
