//! Wire shapes of a successful exchange.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::oauth::AccessToken;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModernTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

/// Token response in the shape of the backend that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TokenResponse {
    Legacy(LegacyTokenResponse),
    Modern(ModernTokenResponse),
}

impl TokenResponse {
    pub fn legacy(token: &AccessToken, now: DateTime<Utc>) -> Self {
        TokenResponse::Legacy(LegacyTokenResponse {
            access_token: token.token.clone(),
            token_type: TOKEN_TYPE_BEARER,
            expires_in: token.expires_in(now),
            scope: token.scope.to_string(),
        })
    }

    pub fn modern(token: &AccessToken, refresh_token: String, now: DateTime<Utc>) -> Self {
        TokenResponse::Modern(ModernTokenResponse {
            access_token: token.token.clone(),
            refresh_token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: token.expires_in(now),
            scope: token.scope.to_string(),
        })
    }

    pub fn access_token(&self) -> &str {
        match self {
            TokenResponse::Legacy(r) => &r.access_token,
            TokenResponse::Modern(r) => &r.access_token,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        match self {
            TokenResponse::Legacy(_) => None,
            TokenResponse::Modern(r) => Some(&r.refresh_token),
        }
    }
}
