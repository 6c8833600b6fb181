//! Credential storage for the session client
//!
//! Holds the single live access/refresh token pair of a client instance.
//! Every replacement bumps a generation counter so callers can tell whether
//! the token a request carried has since been rotated. The store can be
//! backed by a JSON file that is rewritten atomically after each rotation.

pub mod error;
pub mod store;
pub mod token;

pub use error::{Error, Result};
pub use store::{Credential, CredentialStore};
pub use token::{RefreshRequest, TokenPair};
