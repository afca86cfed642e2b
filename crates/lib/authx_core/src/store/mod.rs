//! Persistence collaborators.
//!
//! Each token backend has its own record schema; the adapters in
//! [`crate::adapters`] are the only code that maps these records onto the
//! backend-neutral models. Two implementations are provided: [`PgStore`]
//! (sqlx/PostgreSQL) and [`MemoryStore`] (process-local, used by tests and
//! local runs).

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::auth::{SessionData, User, UserWithPassword};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Legacy client type column value for confidential clients.
pub const LEGACY_CONFIDENTIAL: i16 = 0;
/// Legacy client type column value for public clients.
pub const LEGACY_PUBLIC: i16 = 1;

/// Modern application type column value for confidential clients.
pub const APPLICATION_CONFIDENTIAL: &str = "confidential";
/// Modern application type column value for public clients.
pub const APPLICATION_PUBLIC: &str = "public";

/// Legacy client row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LegacyClientRecord {
    pub client_id: String,
    pub name: String,
    pub user_id: String,
    pub url: String,
    pub redirect_uri: String,
    pub client_secret: String,
    /// [`LEGACY_PUBLIC`] or [`LEGACY_CONFIDENTIAL`].
    pub client_type: i16,
}

/// Legacy access token row. `scope` is the bitwise OR of scope values.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LegacyTokenRecord {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    pub scope: i32,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// Legacy token lookup. Only tokens with `expires > live_at` match.
#[derive(Debug, Clone)]
pub struct LegacyTokenQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<i32>,
    pub live_at: DateTime<Utc>,
}

impl LegacyTokenQuery {
    pub(crate) fn matches(&self, record: &LegacyTokenRecord) -> bool {
        record.expires > self.live_at
            && self.token.as_ref().is_none_or(|t| *t == record.token)
            && self.user_id.as_ref().is_none_or(|u| *u == record.user_id)
            && self.client_id.as_ref().is_none_or(|c| *c == record.client_id)
            && self.scope.is_none_or(|s| s == record.scope)
    }
}

/// Modern application row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApplicationRecord {
    pub client_id: String,
    pub name: String,
    pub user_id: String,
    /// [`APPLICATION_PUBLIC`] or [`APPLICATION_CONFIDENTIAL`].
    pub client_type: String,
    pub authorization_grant_type: String,
    pub client_secret: String,
    /// Space separated.
    pub redirect_uris: String,
    pub skip_authorization: bool,
}

/// Modern access token row. `scope` holds space-separated scope names.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ModernTokenRecord {
    pub token: String,
    pub user_id: String,
    pub application_id: String,
    pub scope: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// Modern refresh token row, bound to one access token.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub access_token: String,
    pub user_id: String,
    pub application_id: String,
    pub created: DateTime<Utc>,
}

/// Modern token lookup. Only tokens with `expires > live_at` match.
#[derive(Debug, Clone)]
pub struct ModernTokenQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub application_id: Option<String>,
    pub scope: Option<String>,
    pub live_at: DateTime<Utc>,
}

impl ModernTokenQuery {
    pub(crate) fn matches(&self, record: &ModernTokenRecord) -> bool {
        record.expires > self.live_at
            && self.token.as_ref().is_none_or(|t| *t == record.token)
            && self.user_id.as_ref().is_none_or(|u| *u == record.user_id)
            && self
                .application_id
                .as_ref()
                .is_none_or(|a| *a == record.application_id)
            && self.scope.as_ref().is_none_or(|s| *s == record.scope)
    }
}

/// Platform user directory.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, StoreError>;

    /// Resolve the user linked to a social account.
    async fn find_by_social_uid(
        &self,
        provider: &str,
        uid: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Whether the user has at least one linked social account.
    async fn has_social_link(&self, user_id: &str) -> Result<bool, StoreError>;
}

/// Legacy backend client and token storage.
#[async_trait]
pub trait LegacyStore: Send + Sync {
    /// Insert a client. Fails with [`StoreError::Conflict`] if the id is taken.
    async fn insert_client(&self, record: LegacyClientRecord) -> Result<(), StoreError>;

    /// Clients matching the optional criteria, in insertion order.
    async fn find_clients(
        &self,
        client_id: Option<&str>,
        client_type: Option<i16>,
    ) -> Result<Vec<LegacyClientRecord>, StoreError>;

    async fn insert_token(&self, record: LegacyTokenRecord) -> Result<(), StoreError>;

    /// Insert `record` unless a token for the same (user, client, scope) is
    /// still live at `record.created`; in that case return the live token.
    async fn insert_token_if_absent(
        &self,
        record: LegacyTokenRecord,
    ) -> Result<LegacyTokenRecord, StoreError>;

    /// Live tokens matching the query, newest first.
    async fn find_tokens(
        &self,
        query: &LegacyTokenQuery,
    ) -> Result<Vec<LegacyTokenRecord>, StoreError>;
}

/// Modern backend application, access token and refresh token storage.
#[async_trait]
pub trait ModernStore: Send + Sync {
    /// Insert an application. Fails with [`StoreError::Conflict`] if the id is taken.
    async fn insert_application(&self, record: ApplicationRecord) -> Result<(), StoreError>;

    /// Applications matching the optional criteria, in insertion order.
    async fn find_applications(
        &self,
        client_id: Option<&str>,
        client_type: Option<&str>,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    async fn insert_access_token(&self, record: ModernTokenRecord) -> Result<(), StoreError>;

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    /// Live tokens matching the query, newest first.
    async fn find_access_tokens(
        &self,
        query: &ModernTokenQuery,
    ) -> Result<Vec<ModernTokenRecord>, StoreError>;

    async fn find_refresh_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;
}

/// Server-side session storage used by the login side effect.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &SessionData) -> Result<(), StoreError>;

    async fn load(&self, session_key: &str) -> Result<Option<SessionData>, StoreError>;
}
