//! authx server binary.
//!
//! Serves the exchange API over Postgres, or provisions OAuth clients.

mod cli;

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use authx_api::config::ApiConfig;
use authx_api::{AppState, Stores};
use authx_core::models::oauth::Backend;
use authx_core::social::{StrategyRegistry, UserInfoStrategy};
use authx_core::store::PgStore;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,authx_api=debug,authx_core=debug".into()),
        )
        .init();

    let args = Cli::parse();
    let mut config = ApiConfig::from_env()?;
    config.pg_connection_url = args.database_url.clone();

    info!(max_connections = args.max_connections, "configuring connection pool");
    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    authx_api::migrate(&pool).await?;

    let strategies = social_strategies(&config.social_auth_backends);
    let store = Arc::new(PgStore::new(pool));
    let state = AppState::new(config, Stores::shared(store), strategies)?;

    match args.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => serve(state, bind).await,
        Commands::CreateClient {
            backend,
            username,
            name,
            client_id,
            redirect_uri,
            confidential,
        } => {
            let owner = state
                .users
                .find_by_username(&username)
                .await?
                .ok_or_else(|| format!("no user named '{username}'"))?
                .user;
            let adapter = state.orchestrator.adapter(Backend::from(backend));
            let client = if confidential {
                adapter
                    .create_confidential_client(&owner, client_id.as_deref())
                    .await?
            } else {
                adapter
                    .create_public_client(&name, &owner, client_id.as_deref(), &redirect_uri)
                    .await?
            };
            println!(
                "{}",
                serde_json::json!({
                    "client_id": client.client_id,
                    "client_type": client.client_type,
                    "backend": client.backend,
                })
            );
            Ok(())
        }
    }
}

fn social_strategies(names: &[String]) -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    for name in names {
        match UserInfoStrategy::builtin(name) {
            Some(strategy) => registry.register(Arc::new(strategy)),
            None => warn!(backend = %name, "no built-in strategy for social backend, skipping"),
        }
    }
    info!(backends = ?registry.names(), "social backends enabled");
    registry
}

async fn serve(state: AppState, bind: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = bind.unwrap_or_else(|| state.config.bind_addr.clone());
    let app = authx_api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
