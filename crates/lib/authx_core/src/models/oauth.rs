//! Backend-neutral OAuth models.
//!
//! Both token backends map their own records onto these shapes; the exchange
//! logic only ever sees `Client` and `AccessToken`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Token storage backend that owns a client or token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// First-generation provider ("DOP"): integer scopes, optional
    /// single-active-token policy, no refresh tokens.
    Legacy,
    /// Current-generation provider ("DOT"): string scopes, refresh tokens.
    Modern,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Legacy => f.write_str("legacy"),
            Backend::Modern => f.write_str("modern"),
        }
    }
}

/// Whether a client can keep a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Public,
    Confidential,
}

/// A registered OAuth consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub client_id: String,
    pub name: String,
    /// Owning user.
    pub user_id: String,
    pub client_type: ClientType,
    pub redirect_uri: String,
    pub backend: Backend,
}

/// An issued first-party bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    pub scope: Scope,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Only ever set by the modern backend.
    pub refresh_token: Option<String>,
    pub backend: Backend,
}

impl AccessToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whole seconds left before expiry, never negative.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Client lookup criteria. Unset fields match anything.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    pub client_id: Option<String>,
    pub client_type: Option<ClientType>,
}

impl ClientFilter {
    pub fn by_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_type: None,
        }
    }

    pub fn by_type(client_type: ClientType) -> Self {
        Self {
            client_id: None,
            client_type: Some(client_type),
        }
    }
}

/// Access token lookup criteria. Unset fields match anything; expired tokens
/// never match.
#[derive(Debug, Clone, Default)]
pub struct TokenFilter {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<Scope>,
}

impl TokenFilter {
    pub fn by_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Match the (user, client, scope) tuple an exchange targets.
    pub fn for_grant(user_id: &str, client_id: &str, scope: &Scope) -> Self {
        Self {
            token: None,
            user_id: Some(user_id.to_string()),
            client_id: Some(client_id.to_string()),
            scope: Some(scope.clone()),
        }
    }
}

/// Longest token lifetime accepted from configuration (one hundred years).
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 36_500;

/// Default token lifetimes, in days, by client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub public_days: i64,
    pub confidential_days: i64,
}

impl TokenLifetimes {
    pub fn days_for(&self, client_type: ClientType) -> i64 {
        match client_type {
            ClientType::Public => self.public_days,
            ClientType::Confidential => self.confidential_days,
        }
    }

    /// Expiry of a token issued at `issued_at`, or `None` when the lifetime
    /// does not fit in a timestamp.
    pub fn expiry(
        &self,
        client_type: ClientType,
        issued_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        chrono::Duration::try_days(self.days_for(client_type))
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            public_days: 30,
            confidential_days: 365,
        }
    }
}
