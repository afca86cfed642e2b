//! User and identity domain models.
//!
//! These are internal domain models, distinct from the wire shapes emitted by
//! `authx_api`.

use serde::{Deserialize, Serialize};

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Inactive users can still authenticate with a bearer token but cannot
    /// obtain new first-party tokens.
    pub is_active: bool,
}

/// User with password hash (for the password grant).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Binding between a social provider account and a platform user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    /// Social backend name, e.g. `google-oauth2`.
    pub provider: String,
    /// Account identifier at the provider.
    pub uid: String,
    pub user_id: String,
}

/// Identity asserted by a social provider for a third-party access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialIdentity {
    pub provider: String,
    pub uid: String,
    pub email: Option<String>,
}

/// Server-side session state written by the login side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub session_key: String,
    pub user_id: String,
    /// Dotted path of the authentication backend that recognized the user.
    pub backend_path: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}
