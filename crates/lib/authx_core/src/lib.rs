//! # authx_core
//!
//! Core logic for authx: exchanging third-party social tokens for
//! first-party OAuth tokens across the legacy and modern token backends.

pub mod adapters;
pub mod auth;
pub mod exchange;
pub mod migrate;
pub mod models;
pub mod scope;
pub mod session;
pub mod social;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
