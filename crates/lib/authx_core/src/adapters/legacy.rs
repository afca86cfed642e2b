//! Legacy ("DOP") backend adapter.
//!
//! Clients carry a small-integer type, tokens carry an integer scope bitmask
//! and no refresh token.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{AdapterError, DUMMY_REDIRECT_URL, OAuthAdapter, client_insert_error};
use crate::auth::tokens::{CLIENT_ID_LEN, LEGACY_TOKEN_LEN, generate_token};
use crate::models::auth::User;
use crate::models::oauth::{
    AccessToken, Backend, Client, ClientFilter, ClientType, TokenFilter, TokenLifetimes,
};
use crate::scope::{SCOPE_VALUES, Scope};
use crate::store::{
    LEGACY_CONFIDENTIAL, LEGACY_PUBLIC, LegacyClientRecord, LegacyStore, LegacyTokenQuery,
    LegacyTokenRecord,
};

/// Response fields emitted for legacy tokens.
pub const LEGACY_RESPONSE_KEYS: &[&str] = &["access_token", "token_type", "expires_in", "scope"];

fn to_client_type(value: i16) -> ClientType {
    if value == LEGACY_PUBLIC {
        ClientType::Public
    } else {
        ClientType::Confidential
    }
}

fn from_client_type(client_type: ClientType) -> i16 {
    match client_type {
        ClientType::Public => LEGACY_PUBLIC,
        ClientType::Confidential => LEGACY_CONFIDENTIAL,
    }
}

fn to_client(record: LegacyClientRecord) -> Client {
    Client {
        client_id: record.client_id,
        name: record.name,
        user_id: record.user_id,
        client_type: to_client_type(record.client_type),
        redirect_uri: record.redirect_uri,
        backend: Backend::Legacy,
    }
}

fn to_token(record: LegacyTokenRecord) -> AccessToken {
    AccessToken {
        token: record.token,
        user_id: record.user_id,
        client_id: record.client_id,
        scope: Scope::from_bits(record.scope),
        issued_at: record.created,
        expires_at: record.expires,
        refresh_token: None,
        backend: Backend::Legacy,
    }
}

/// Adapter over a [`LegacyStore`].
pub struct LegacyAdapter {
    store: Arc<dyn LegacyStore>,
    lifetimes: TokenLifetimes,
}

impl LegacyAdapter {
    pub fn new(store: Arc<dyn LegacyStore>, lifetimes: TokenLifetimes) -> Self {
        Self { store, lifetimes }
    }

    fn new_token_record(
        &self,
        user: &User,
        scope: &Scope,
        client: &Client,
    ) -> Result<LegacyTokenRecord, AdapterError> {
        let now = Utc::now();
        let expires = self
            .lifetimes
            .expiry(client.client_type, now)
            .ok_or(AdapterError::LifetimeOutOfRange(
                self.lifetimes.days_for(client.client_type),
            ))?;
        Ok(LegacyTokenRecord {
            token: generate_token(LEGACY_TOKEN_LEN),
            user_id: user.id.clone(),
            client_id: client.client_id.clone(),
            scope: scope.to_bits(),
            created: now,
            expires,
        })
    }

    /// Create a token unless one is already live for (user, client, scope),
    /// in which case the live one is returned. The check and the insert are
    /// a single store operation.
    pub async fn create_exclusive_access_token(
        &self,
        user: &User,
        scope: &Scope,
        client: &Client,
    ) -> Result<AccessToken, AdapterError> {
        let record = self.new_token_record(user, scope, client)?;
        let stored = self.store.insert_token_if_absent(record).await?;
        Ok(to_token(stored))
    }

    async fn insert_client(
        &self,
        record: LegacyClientRecord,
    ) -> Result<Client, AdapterError> {
        self.store
            .insert_client(record.clone())
            .await
            .map_err(client_insert_error)?;
        debug!(client_id = %record.client_id, "provisioned legacy client");
        Ok(to_client(record))
    }
}

#[async_trait]
impl OAuthAdapter for LegacyAdapter {
    fn backend(&self) -> Backend {
        Backend::Legacy
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
                .find_clients(Some(id), None)
                .await?
                .into_iter()
                .next()
        {
            let same = existing.name == name
                && existing.user_id == user.id
                && existing.redirect_uri == redirect_uri
                && existing.client_type == LEGACY_PUBLIC;
            return if same {
                Ok(to_client(existing))
            } else {
                Err(AdapterError::DuplicateClient(id.to_string()))
            };
        }

        self.insert_client(LegacyClientRecord {
            client_id: client_id.map_or_else(|| generate_token(CLIENT_ID_LEN), str::to_string),
            name: name.to_string(),
            user_id: user.id.clone(),
            url: String::new(),
            redirect_uri: redirect_uri.to_string(),
            client_secret: generate_token(LEGACY_TOKEN_LEN),
            client_type: LEGACY_PUBLIC,
        })
        .await
    }

    async fn create_confidential_client(
        &self,
        user: &User,
        client_id: Option<&str>,
    ) -> Result<Client, AdapterError> {
        self.insert_client(LegacyClientRecord {
            client_id: client_id.map_or_else(|| generate_token(CLIENT_ID_LEN), str::to_string),
            name: String::new(),
            user_id: user.id.clone(),
            url: String::new(),
            redirect_uri: DUMMY_REDIRECT_URL.to_string(),
            client_secret: generate_token(LEGACY_TOKEN_LEN),
            client_type: LEGACY_CONFIDENTIAL,
        })
        .await
    }

    async fn get_client(&self, filter: &ClientFilter) -> Result<Client, AdapterError> {
        self.store
            .find_clients(
                filter.client_id.as_deref(),
                filter.client_type.map(from_client_type),
            )
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
        let query = LegacyTokenQuery {
            token: filter.token.clone(),
            user_id: filter.user_id.clone(),
            client_id: filter.client_id.clone(),
            scope: filter.scope.as_ref().map(Scope::to_bits),
            live_at: Utc::now(),
        };
        self.store
            .find_tokens(&query)
            .await?
            .into_iter()
            .next()
            .map(to_token)
            .ok_or(AdapterError::TokenNotFound)
    }

    async fn create_access_token(
        &self,
        user: &User,
        scope: &Scope,
        client: &Client,
    ) -> Result<AccessToken, AdapterError> {
        let record = self.new_token_record(user, scope, client)?;
        self.store.insert_token(record.clone()).await?;
        Ok(to_token(record))
    }

    fn supported_scopes(&self) -> BTreeSet<&'static str> {
        SCOPE_VALUES.iter().map(|(name, _)| *name).collect()
    }

    fn response_keys(&self) -> &'static [&'static str] {
        LEGACY_RESPONSE_KEYS
    }
}
