//! Token lookup-or-create for a validated exchange.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::{ExchangeError, ExchangeRequest, TokenResponse};
use crate::adapters::{
    AdapterError, IssuanceContext, LegacyAdapter, ModernAdapter, OAuthAdapter,
};
use crate::models::oauth::{AccessToken, Backend, ClientFilter, TokenFilter};

/// Owns both adapters and the legacy single-token policy.
pub struct Orchestrator {
    legacy: Arc<LegacyAdapter>,
    modern: Arc<ModernAdapter>,
    single_access_token: bool,
}

impl Orchestrator {
    pub fn new(
        legacy: Arc<LegacyAdapter>,
        modern: Arc<ModernAdapter>,
        single_access_token: bool,
    ) -> Self {
        Self {
            legacy,
            modern,
            single_access_token,
        }
    }

    pub fn adapter(&self, backend: Backend) -> &dyn OAuthAdapter {
        match backend {
            Backend::Legacy => self.legacy.as_ref(),
            Backend::Modern => self.modern.as_ref(),
        }
    }

    pub fn legacy(&self) -> &LegacyAdapter {
        &self.legacy
    }

    pub fn modern(&self) -> &ModernAdapter {
        &self.modern
    }

    /// Backend that owns `client_id`, checking the modern store first.
    ///
    /// Unknown or missing ids resolve to the legacy backend so validation
    /// reports them in its usual order.
    pub async fn backend_for_client(
        &self,
        client_id: Option<&str>,
    ) -> Result<Backend, ExchangeError> {
        let Some(client_id) = client_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok(Backend::Legacy);
        };
        let filter = ClientFilter::by_id(client_id);
        match self.modern.get_client(&filter).await {
            Ok(_) => return Ok(Backend::Modern),
            Err(AdapterError::ClientNotFound) => {}
            Err(e) => return Err(e.into()),
        }
        match self.legacy.get_client(&filter).await {
            Ok(_) | Err(AdapterError::ClientNotFound) => Ok(Backend::Legacy),
            Err(e) => Err(e.into()),
        }
    }

    /// Answer a GET on an exchange endpoint. The legacy endpoint lets it
    /// through with an empty result; the modern one rejects it.
    pub fn check_get(&self, backend: Backend) -> Result<(), ExchangeError> {
        match backend {
            Backend::Legacy => Ok(()),
            Backend::Modern => Err(ExchangeError::MethodNotAllowed),
        }
    }

    /// Return a live token for the request, creating one when needed. The
    /// token is minted by the backend that owns the request's client.
    pub async fn exchange(&self, request: ExchangeRequest) -> Result<TokenResponse, ExchangeError> {
        let backend = request.client().backend;
        let response = match backend {
            Backend::Legacy => {
                let token = self.exchange_legacy(&request).await?;
                TokenResponse::legacy(&token, Utc::now())
            }
            Backend::Modern => {
                let (token, refresh_token) = self.exchange_modern(&request).await?;
                TokenResponse::modern(&token, refresh_token, Utc::now())
            }
        };
        info!(
            backend = %backend,
            client_id = %request.client().client_id,
            user_id = %request.user().id,
            "access token exchanged"
        );
        Ok(response)
    }

    async fn exchange_legacy(&self, request: &ExchangeRequest) -> Result<AccessToken, ExchangeError> {
        let (user, scope, client) = (request.user(), request.scope(), request.client());
        if !self.single_access_token {
            return Ok(self.legacy.create_access_token(user, scope, client).await?);
        }

        let filter = TokenFilter::for_grant(&user.id, &client.client_id, scope);
        match self.legacy.get_access_token(&filter).await {
            Ok(token) => {
                debug!(client_id = %client.client_id, "reusing live legacy token");
                Ok(token)
            }
            Err(AdapterError::TokenNotFound) => Ok(self
                .legacy
                .create_exclusive_access_token(user, scope, client)
                .await?),
            Err(e) => Err(e.into()),
        }
    }

    async fn exchange_modern(
        &self,
        request: &ExchangeRequest,
    ) -> Result<(AccessToken, String), ExchangeError> {
        let (user, scope, client) = (request.user(), request.scope(), request.client());
        let filter = TokenFilter::for_grant(&user.id, &client.client_id, scope);
        match self.modern.get_access_token(&filter).await {
            Ok(token) => {
                debug!(client_id = %client.client_id, "reusing live modern token");
                let refresh_token = self.modern.ensure_refresh_token(&token, user, client).await?;
                Ok((token, refresh_token))
            }
            Err(AdapterError::TokenNotFound) => {
                let ctx = IssuanceContext::password_grant(user, scope, client);
                let token = self.modern.issue_bearer_token(ctx, true).await?;
                let refresh_token = self.modern.ensure_refresh_token(&token, user, client).await?;
                Ok((token, refresh_token))
            }
            Err(e) => Err(e.into()),
        }
    }
}
