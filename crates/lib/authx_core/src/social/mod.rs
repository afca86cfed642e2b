//! Social identity verification.
//!
//! A strategy turns a third-party access token into the identity the
//! provider asserts for it. Strategies are registered under the backend name
//! that appears in the exchange URL (`google-oauth2`, `facebook`, ...).

pub mod userinfo;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::SocialIdentity;

pub use userinfo::UserInfoStrategy;

/// Social verification errors.
#[derive(Debug, Error)]
pub enum SocialError {
    /// The provider rejected the token or returned no usable identity.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unknown social backend: {0}")]
    UnknownBackend(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Verifies third-party access tokens for one provider.
#[async_trait]
pub trait SocialStrategy: Send + Sync {
    /// Backend name this strategy is registered under.
    fn name(&self) -> &str;

    /// Resolve the identity behind `access_token`.
    async fn user_data(&self, access_token: &str) -> Result<SocialIdentity, SocialError>;
}

/// Strategies keyed by backend name.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn SocialStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn SocialStrategy>) {
        self.strategies
            .insert(strategy.name().to_string(), strategy);
    }

    pub fn with(mut self, strategy: Arc<dyn SocialStrategy>) -> Self {
        self.register(strategy);
        self
    }

    pub fn get(&self, backend: &str) -> Result<Arc<dyn SocialStrategy>, SocialError> {
        self.strategies
            .get(backend)
            .cloned()
            .ok_or_else(|| SocialError::UnknownBackend(backend.to_string()))
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
