//! # authx_api
//!
//! HTTP API library for authx.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use authx_core::adapters::{LegacyAdapter, ModernAdapter};
use authx_core::auth::backends::{AuthBackend, load_backends};
use authx_core::exchange::{ExchangeValidator, Orchestrator, PasswordGrantValidator};
use authx_core::scope::Scope;
use authx_core::social::StrategyRegistry;
use authx_core::store::{LegacyStore, ModernStore, SessionStore, UserStore};

use crate::config::{ApiConfig, ConfigError};
use crate::handlers::{exchange, session, token};

/// Persistence collaborators, one trait object per concern.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub legacy: Arc<dyn LegacyStore>,
    pub modern: Arc<dyn ModernStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Stores {
    /// Serve every concern from a single store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserStore + LegacyStore + ModernStore + SessionStore + 'static,
    {
        Self {
            users: store.clone(),
            legacy: store.clone(),
            modern: store.clone(),
            sessions: store,
        }
    }
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub validator: Arc<ExchangeValidator>,
    pub password_grant: Arc<PasswordGrantValidator>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// Authentication backends, in resolution order.
    pub backends: Arc<Vec<Arc<dyn AuthBackend>>>,
}

impl AppState {
    /// Wire adapters, validators and backends from configuration.
    pub fn new(
        config: ApiConfig,
        stores: Stores,
        strategies: StrategyRegistry,
    ) -> Result<Self, ConfigError> {
        let modern_scopes = Scope::from_names(config.modern_scopes.iter().map(String::as_str))
            .map_err(ConfigError::UnknownScope)?;
        let backends = load_backends(&config.authentication_backends, stores.users.clone())
            .map_err(ConfigError::UnknownAuthBackend)?;

        let legacy = Arc::new(LegacyAdapter::new(stores.legacy, config.token_lifetimes));
        let modern = Arc::new(
            ModernAdapter::new(stores.modern, config.token_lifetimes).with_scopes(&modern_scopes),
        );
        let orchestrator = Orchestrator::new(legacy, modern, config.single_access_token);

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            validator: Arc::new(ExchangeValidator::new(
                Arc::new(strategies),
                stores.users.clone(),
            )),
            password_grant: Arc::new(PasswordGrantValidator::new(stores.users.clone())),
            users: stores.users,
            sessions: stores.sessions,
            backends: Arc::new(backends),
            config,
        })
    }
}

/// Run embedded database migrations.
///
/// Delegates to `authx_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    authx_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route(
            routes::POST_EXCHANGE_ACCESS_TOKEN,
            post(exchange::exchange_handler),
        )
        .route(
            routes::DOP_EXCHANGE_ACCESS_TOKEN,
            get(exchange::legacy_exchange_get_handler).post(exchange::legacy_exchange_handler),
        )
        .route(
            routes::DOT_EXCHANGE_ACCESS_TOKEN,
            get(exchange::modern_exchange_get_handler).post(exchange::modern_exchange_handler),
        )
        .route(routes::POST_ACCESS_TOKEN, post(token::access_token_handler));

    // Bearer-authenticated routes
    let protected = Router::new()
        .route(routes::POST_LOGIN, post(session::login_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_bearer,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
