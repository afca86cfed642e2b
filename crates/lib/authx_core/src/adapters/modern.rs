//! Modern ("DOT") backend adapter.
//!
//! Applications carry a string client type, tokens carry space separated
//! scope names, and every minted access token gets its own refresh token.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{AdapterError, DUMMY_REDIRECT_URL, OAuthAdapter, client_insert_error};
use crate::auth::tokens::{CLIENT_ID_LEN, LEGACY_TOKEN_LEN, MODERN_TOKEN_LEN, generate_token};
use crate::models::auth::User;
use crate::models::oauth::{
    AccessToken, Backend, Client, ClientFilter, ClientType, TokenFilter, TokenLifetimes,
};
use crate::scope::Scope;
use crate::store::{
    APPLICATION_CONFIDENTIAL, APPLICATION_PUBLIC, ApplicationRecord, ModernStore,
    ModernTokenQuery, ModernTokenRecord, RefreshTokenRecord,
};

/// Response fields emitted for modern tokens.
pub const MODERN_RESPONSE_KEYS: &[&str] = &[
    "access_token",
    "refresh_token",
    "token_type",
    "expires_in",
    "scope",
];

/// Scopes accepted by the modern backend unless configured otherwise.
pub const DEFAULT_MODERN_SCOPES: &[&str] = &["openid", "profile", "email"];

const GRANT_PASSWORD: &str = "password";
const GRANT_AUTHORIZATION_CODE: &str = "authorization-code";

/// Grant under which a token is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum GrantType {
    Password,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => GRANT_PASSWORD,
        }
    }
}

/// Everything the bearer token generator needs, as one immutable value.
#[derive(Debug, Clone)]
pub struct IssuanceContext {
    pub client: Client,
    pub user: User,
    pub scopes: Vec<&'static str>,
    pub grant_type: GrantType,
    pub state: Option<String>,
    pub refresh_token: Option<String>,
    pub extra_credentials: Option<serde_json::Map<String, serde_json::Value>>,
}

impl IssuanceContext {
    /// Context for a token issued on behalf of an already-authenticated user.
    pub fn password_grant(user: &User, scope: &Scope, client: &Client) -> Self {
        Self {
            client: client.clone(),
            user: user.clone(),
            scopes: scope.names().to_vec(),
            grant_type: GrantType::Password,
            state: None,
            refresh_token: None,
            extra_credentials: None,
        }
    }
}

fn to_client(record: ApplicationRecord) -> Client {
    let client_type = if record.client_type == APPLICATION_PUBLIC {
        ClientType::Public
    } else {
        ClientType::Confidential
    };
    Client {
        redirect_uri: record
            .redirect_uris
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        client_id: record.client_id,
        name: record.name,
        user_id: record.user_id,
        client_type,
        backend: Backend::Modern,
    }
}

fn to_token(record: ModernTokenRecord, refresh_token: Option<String>) -> AccessToken {
    AccessToken {
        token: record.token,
        user_id: record.user_id,
        client_id: record.application_id,
        scope: Scope::from_stored(&record.scope),
        issued_at: record.created,
        expires_at: record.expires,
        refresh_token,
        backend: Backend::Modern,
    }
}

/// Adapter over a [`ModernStore`].
pub struct ModernAdapter {
    store: Arc<dyn ModernStore>,
    lifetimes: TokenLifetimes,
    scopes: BTreeSet<&'static str>,
}

impl ModernAdapter {
    pub fn new(store: Arc<dyn ModernStore>, lifetimes: TokenLifetimes) -> Self {
        Self {
            store,
            lifetimes,
            scopes: Scope::from_names(DEFAULT_MODERN_SCOPES.iter().copied())
                .unwrap_or_default()
                .names()
                .iter()
                .copied()
                .collect(),
        }
    }

    /// Replace the accepted scope names.
    pub fn with_scopes(mut self, scope: &Scope) -> Self {
        self.scopes = scope.names().iter().copied().collect();
        self
    }

    /// Mint an access token for `ctx`, plus a refresh token when
    /// `with_refresh` is set. Modern tokens always use the public-client
    /// lifetime.
    pub async fn issue_bearer_token(
        &self,
        ctx: IssuanceContext,
        with_refresh: bool,
    ) -> Result<AccessToken, AdapterError> {
        debug!(
            client_id = %ctx.client.client_id,
            grant_type = ctx.grant_type.as_str(),
            state = ?ctx.state,
            "issuing bearer token"
        );
        let now = Utc::now();
        let expires = self
            .lifetimes
            .expiry(ClientType::Public, now)
            .ok_or(AdapterError::LifetimeOutOfRange(self.lifetimes.public_days))?;
        let scope = Scope::from_names(ctx.scopes.iter().copied()).unwrap_or_default();
        let record = ModernTokenRecord {
            token: generate_token(MODERN_TOKEN_LEN),
            user_id: ctx.user.id.clone(),
            application_id: ctx.client.client_id.clone(),
            scope: scope.to_string(),
            created: now,
            expires,
        };
        self.store.insert_access_token(record.clone()).await?;

        let refresh_token = if with_refresh {
            Some(self.insert_refresh_token(&record.token, &ctx.user, &ctx.client).await?)
        } else {
            None
        };
        Ok(to_token(record, refresh_token))
    }

    /// Return the token's refresh token, creating one if it has none.
    pub async fn ensure_refresh_token(
        &self,
        token: &AccessToken,
        user: &User,
        client: &Client,
    ) -> Result<String, AdapterError> {
        if let Some(existing) = &token.refresh_token {
            return Ok(existing.clone());
        }
        if let Some(record) = self.store.find_refresh_token(&token.token).await? {
            return Ok(record.token);
        }
        self.insert_refresh_token(&token.token, user, client).await
    }

    async fn insert_refresh_token(
        &self,
        access_token: &str,
        user: &User,
        client: &Client,
    ) -> Result<String, AdapterError> {
        let record = RefreshTokenRecord {
            token: generate_token(MODERN_TOKEN_LEN),
            access_token: access_token.to_string(),
            user_id: user.id.clone(),
            application_id: client.client_id.clone(),
            created: Utc::now(),
        };
        self.store.insert_refresh_token(record.clone()).await?;
        Ok(record.token)
    }

    async fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<Client, AdapterError> {
        self.store
            .insert_application(record.clone())
            .await
            .map_err(client_insert_error)?;
        debug!(client_id = %record.client_id, "provisioned modern application");
        Ok(to_client(record))
    }
}

#[async_trait]
impl OAuthAdapter for ModernAdapter {
    fn backend(&self) -> Backend {
        Backend::Modern
    }

    async fn create_public_client(
        &self,
        name: &str,
        user: &User,
        client_id: Option<&str>,
        redirect_uri: &str,
    ) -> Result<Client, AdapterError> {
        if let Some(id) = client_id
            && let Some(existing) = self
                .store
                .find_applications(Some(id), None)
                .await?
                .into_iter()
                .next()
        {
            let same = existing.name == name
                && existing.user_id == user.id
                && existing.redirect_uris == redirect_uri
                && existing.client_type == APPLICATION_PUBLIC;
            return if same {
                Ok(to_client(existing))
            } else {
                Err(AdapterError::DuplicateClient(id.to_string()))
            };
        }

        self.insert_application(ApplicationRecord {
            client_id: client_id.map_or_else(|| generate_token(CLIENT_ID_LEN), str::to_string),
            name: name.to_string(),
            user_id: user.id.clone(),
            client_type: APPLICATION_PUBLIC.to_string(),
            authorization_grant_type: GRANT_PASSWORD.to_string(),
            client_secret: generate_token(LEGACY_TOKEN_LEN),
            redirect_uris: redirect_uri.to_string(),
            skip_authorization: false,
        })
        .await
    }

    async fn create_confidential_client(
        &self,
        user: &User,
        client_id: Option<&str>,
    ) -> Result<Client, AdapterError> {
        self.insert_application(ApplicationRecord {
            client_id: client_id.map_or_else(|| generate_token(CLIENT_ID_LEN), str::to_string),
            name: String::new(),
            user_id: user.id.clone(),
            client_type: APPLICATION_CONFIDENTIAL.to_string(),
            authorization_grant_type: GRANT_AUTHORIZATION_CODE.to_string(),
            client_secret: generate_token(LEGACY_TOKEN_LEN),
            redirect_uris: DUMMY_REDIRECT_URL.to_string(),
            skip_authorization: false,
        })
        .await
    }

    async fn get_client(&self, filter: &ClientFilter) -> Result<Client, AdapterError> {
        let client_type = filter.client_type.map(|t| match t {
            ClientType::Public => APPLICATION_PUBLIC,
            ClientType::Confidential => APPLICATION_CONFIDENTIAL,
        });
        self.store
            .find_applications(filter.client_id.as_deref(), client_type)
            .await?
            .into_iter()
            .next()
            .map(to_client)
            .ok_or(AdapterError::ClientNotFound)
    }

    async fn get_client_for_token(&self, token: &AccessToken) -> Result<Client, AdapterError> {
        self.get_client(&ClientFilter::by_id(token.client_id.as_str()))
            .await
    }

    async fn get_access_token(&self, filter: &TokenFilter) -> Result<AccessToken, AdapterError> {
        let query = ModernTokenQuery {
            token: filter.token.clone(),
            user_id: filter.user_id.clone(),
            application_id: filter.client_id.clone(),
            scope: filter.scope.as_ref().map(Scope::to_string),
            live_at: Utc::now(),
        };
        let Some(record) = self.store.find_access_tokens(&query).await?.into_iter().next() else {
            return Err(AdapterError::TokenNotFound);
        };
        let refresh_token = self
            .store
            .find_refresh_token(&record.token)
            .await?
            .map(|r| r.token);
        Ok(to_token(record, refresh_token))
    }

    async fn create_access_token(
        &self,
        user: &User,
        scope: &Scope,
        client: &Client,
    ) -> Result<AccessToken, AdapterError> {
        self.issue_bearer_token(IssuanceContext::password_grant(user, scope, client), true)
            .await
    }

    fn supported_scopes(&self) -> BTreeSet<&'static str> {
        self.scopes.clone()
    }

    fn response_keys(&self) -> &'static [&'static str] {
        MODERN_RESPONSE_KEYS
    }
}
