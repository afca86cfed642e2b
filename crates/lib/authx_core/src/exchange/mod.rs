//! Third-party → first-party token exchange.
//!
//! [`ExchangeValidator`] (and, for the password grant,
//! [`PasswordGrantValidator`]) turn a raw form into an [`ExchangeRequest`];
//! [`Orchestrator`] turns an `ExchangeRequest` into a [`TokenResponse`] using
//! the adapter of the backend that owns the client.

pub mod orchestrator;
pub mod password;
pub mod response;
pub mod validator;

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::AdapterError;
use crate::models::auth::User;
use crate::models::oauth::Client;
use crate::scope::Scope;
use crate::store::StoreError;

pub use orchestrator::Orchestrator;
pub use password::{PasswordGrantForm, PasswordGrantValidator};
pub use response::TokenResponse;
pub use validator::{ExchangeValidator, VerifiedIdentity};

/// Message used for absent or blank required fields.
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Exchange errors. Everything except `Adapter`, `Store` and `Internal` is a
/// client error reported against a form field.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid third-party token: {0}")]
    InvalidThirdPartyToken(String),

    #[error("Invalid client: {0}")]
    InvalidClient(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("User resolution failed: {0}")]
    UserResolution(String),

    #[error("Unknown social backend: {0}")]
    UnknownBackend(String),

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Only POST requests allowed.")]
    MethodNotAllowed,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Form field a validation failure is reported under.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ExchangeError::MissingField(field) => Some(field),
            ExchangeError::InvalidThirdPartyToken(_) | ExchangeError::UserResolution(_) => {
                Some("access_token")
            }
            ExchangeError::InvalidClient(_) => Some("client_id"),
            ExchangeError::InvalidScope(_) => Some("scope"),
            ExchangeError::UnsupportedGrantType(_) => Some("grant_type"),
            ExchangeError::InvalidGrant(_) => Some("password"),
            _ => None,
        }
    }

    /// `{field: [message]}` for validation failures.
    pub fn field_errors(&self) -> Option<BTreeMap<String, Vec<String>>> {
        let field = self.field()?;
        let message = match self {
            ExchangeError::MissingField(_) => REQUIRED_MESSAGE.to_string(),
            ExchangeError::InvalidThirdPartyToken(m)
            | ExchangeError::InvalidClient(m)
            | ExchangeError::InvalidScope(m)
            | ExchangeError::UserResolution(m)
            | ExchangeError::UnsupportedGrantType(m)
            | ExchangeError::InvalidGrant(m) => m.clone(),
            _ => self.to_string(),
        };
        Some(BTreeMap::from([(field.to_string(), vec![message])]))
    }
}

/// Raw exchange form as posted by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeForm {
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

/// A validated exchange: the user, scope and client a token is issued for.
///
/// Only the validators in this module can build one.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    user: User,
    scope: Scope,
    client: Client,
}

impl ExchangeRequest {
    pub(crate) fn new(user: User, scope: Scope, client: Client) -> Self {
        Self {
            user,
            scope,
            client,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Trimmed value of a required field.
pub(crate) fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ExchangeError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ExchangeError::MissingField(field))
}
