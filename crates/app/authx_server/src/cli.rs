use clap::{Parser, Subcommand, ValueEnum};

use authx_core::adapters::DUMMY_REDIRECT_URL;
use authx_core::models::oauth::Backend;

/// CLI arguments for the authx server.
#[derive(Parser, Debug)]
#[command(name = "authx_server", version, about = "authx token exchange server")]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/authx"
    )]
    pub database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, global = true, default_value_t = 5)]
    pub max_connections: u32,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API (default).
    Serve {
        /// Listen address; overrides `BIND_ADDR`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Provision an OAuth client on one backend and print it as JSON.
    CreateClient {
        #[arg(long, value_enum)]
        backend: BackendArg,

        /// Username of the owning user.
        #[arg(long)]
        username: String,

        #[arg(long, default_value = "")]
        name: String,

        /// Generated when omitted.
        #[arg(long)]
        client_id: Option<String>,

        #[arg(long, default_value = DUMMY_REDIRECT_URL)]
        redirect_uri: String,

        /// Create a confidential client instead of a public one.
        #[arg(long, default_value_t = false)]
        confidential: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendArg {
    /// Legacy (DOP) backend.
    Legacy,
    /// Modern (DOT) backend.
    Modern,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Legacy => Backend::Legacy,
            BackendArg::Modern => Backend::Modern,
        }
    }
}
