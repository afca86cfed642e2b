//! Credential primitives and authentication backends.
//!
//! Password hashing, opaque token generation, and the ordered set of
//! authentication backends consulted by the session upgrade.

pub mod backends;
pub mod password;
pub mod tokens;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Internal error: {0}")]
    Internal(String),
}
