//! Opaque credential generation.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};

/// Length of legacy access tokens and client secrets.
pub const LEGACY_TOKEN_LEN: usize = 40;

/// Length of modern access and refresh tokens.
pub const MODERN_TOKEN_LEN: usize = 30;

/// Length of generated client identifiers.
pub const CLIENT_ID_LEN: usize = 20;

/// Generate a random alphanumeric string of `len` characters.
pub fn generate_token(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
