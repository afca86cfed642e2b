//! Uniform access to the two OAuth token backends.
//!
//! [`LegacyAdapter`] and [`ModernAdapter`] each wrap their own store and
//! record schema and expose the same capability set through [`OAuthAdapter`].
//! The exchange validator only ever talks to `&dyn OAuthAdapter`.

pub mod legacy;
pub mod modern;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::User;
use crate::models::oauth::{AccessToken, Backend, Client, ClientFilter, TokenFilter};
use crate::scope::Scope;
use crate::store::StoreError;

pub use legacy::LegacyAdapter;
pub use modern::{GrantType, IssuanceContext, ModernAdapter};

/// Redirect URI given to clients provisioned without one.
pub const DUMMY_REDIRECT_URL: &str = "https://example.invalid/redirect";

/// Adapter errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Client not found")]
    ClientNotFound,

    /// No live token matched. Callers decide whether this means "create one".
    #[error("Access token not found")]
    TokenNotFound,

    #[error("Duplicate client: {0}")]
    DuplicateClient(String),

    #[error("Token lifetime of {0} days is out of range")]
    LifetimeOutOfRange(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Client inserts report id collisions as duplicates.
pub(crate) fn client_insert_error(e: StoreError) -> AdapterError {
    match e {
        StoreError::Conflict(msg) => AdapterError::DuplicateClient(msg),
        other => AdapterError::Store(other),
    }
}

/// Capability set shared by both token backends.
#[async_trait]
pub trait OAuthAdapter: Send + Sync {
    fn backend(&self) -> Backend;

    /// Provision a public client. Idempotent by id: an existing client with
    /// the same configuration is returned as-is, a different one is a
    /// [`AdapterError::DuplicateClient`]. A missing id is generated.
    async fn create_public_client(
        &self,
        name: &str,
        user: &User,
        client_id: Option<&str>,
        redirect_uri: &str,
    ) -> Result<Client, AdapterError>;

    /// Provision a confidential client.
    async fn create_confidential_client(
        &self,
        user: &User,
        client_id: Option<&str>,
    ) -> Result<Client, AdapterError>;

    /// First client matching `filter`.
    async fn get_client(&self, filter: &ClientFilter) -> Result<Client, AdapterError>;

    async fn get_client_for_token(&self, token: &AccessToken) -> Result<Client, AdapterError>;

    /// Newest live token matching `filter`. Expired tokens are reported as
    /// [`AdapterError::TokenNotFound`].
    async fn get_access_token(&self, filter: &TokenFilter) -> Result<AccessToken, AdapterError>;

    /// Mint a new token with the configured lifetime.
    async fn create_access_token(
        &self,
        user: &User,
        scope: &Scope,
        client: &Client,
    ) -> Result<AccessToken, AdapterError>;

    /// Scope names this backend accepts on an exchange.
    fn supported_scopes(&self) -> BTreeSet<&'static str>;

    /// Fields of a successful token response from this backend.
    fn response_keys(&self) -> &'static [&'static str];
}
