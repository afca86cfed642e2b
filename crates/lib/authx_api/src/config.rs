//! API server configuration.

use authx_core::auth::backends::{MODEL_BACKEND, SOCIAL_AUTH_BACKEND};
use authx_core::models::oauth::{MAX_TOKEN_LIFETIME_DAYS, TokenLifetimes};
use thiserror::Error;

/// Longest session cookie age accepted, in seconds (one hundred years).
pub const MAX_SESSION_COOKIE_AGE_SECS: i64 = 60 * 60 * 24 * 36_500;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("Unknown authentication backend: {0}")]
    UnknownAuthBackend(String),

    #[error("Unknown scope: {0}")]
    UnknownScope(String),
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Reuse a live legacy token for (user, client, scope) instead of minting.
    pub single_access_token: bool,
    pub token_lifetimes: TokenLifetimes,
    /// Scope names the modern backend accepts.
    pub modern_scopes: Vec<String>,
    /// Authentication backend paths, in resolution order.
    pub authentication_backends: Vec<String>,
    /// Social backends exposed under `/oauth2/.../{backend}`.
    pub social_auth_backends: Vec<String>,
    pub session_cookie_name: String,
    pub session_cookie_age_secs: i64,
    pub session_cookie_secure: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            pg_connection_url: "postgres://localhost:5432/authx".into(),
            single_access_token: false,
            token_lifetimes: TokenLifetimes::default(),
            modern_scopes: split_list("openid profile email"),
            authentication_backends: vec![MODEL_BACKEND.into(), SOCIAL_AUTH_BACKEND.into()],
            social_auth_backends: split_list("google-oauth2,facebook,github"),
            session_cookie_name: "sessionid".into(),
            session_cookie_age_secs: 60 * 60 * 24 * 14,
            session_cookie_secure: false,
        }
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                                | Default                                  |
    /// |-----------------------------------------|------------------------------------------|
    /// | `BIND_ADDR`                             | `127.0.0.1:3100`                         |
    /// | `DATABASE_URL`                          | `postgres://localhost:5432/authx`        |
    /// | `OAUTH_SINGLE_ACCESS_TOKEN`             | `false`                                  |
    /// | `OAUTH_EXPIRE_PUBLIC_CLIENT_DAYS`       | `30`                                     |
    /// | `OAUTH_EXPIRE_CONFIDENTIAL_CLIENT_DAYS` | `365`                                    |
    /// | `OAUTH_MODERN_SCOPES`                   | `openid profile email`                   |
    /// | `AUTHENTICATION_BACKENDS`               | model backend, social auth backend       |
    /// | `SOCIAL_AUTH_BACKENDS`                  | `google-oauth2,facebook,github`          |
    /// | `SESSION_COOKIE_NAME`                   | `sessionid`                              |
    /// | `SESSION_COOKIE_AGE_SECS`               | `1209600` (two weeks)                    |
    /// | `SESSION_COOKIE_SECURE`                 | `false`                                  |
    ///
    /// List variables accept commas or whitespace as separators.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ApiConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            pg_connection_url: lookup("DATABASE_URL").unwrap_or(defaults.pg_connection_url),
            single_access_token: parse_bool(
                "OAUTH_SINGLE_ACCESS_TOKEN",
                lookup("OAUTH_SINGLE_ACCESS_TOKEN"),
                defaults.single_access_token,
            )?,
            token_lifetimes: TokenLifetimes {
                public_days: parse_num(
                    "OAUTH_EXPIRE_PUBLIC_CLIENT_DAYS",
                    lookup("OAUTH_EXPIRE_PUBLIC_CLIENT_DAYS"),
                    defaults.token_lifetimes.public_days,
                    MAX_TOKEN_LIFETIME_DAYS,
                )?,
                confidential_days: parse_num(
                    "OAUTH_EXPIRE_CONFIDENTIAL_CLIENT_DAYS",
                    lookup("OAUTH_EXPIRE_CONFIDENTIAL_CLIENT_DAYS"),
                    defaults.token_lifetimes.confidential_days,
                    MAX_TOKEN_LIFETIME_DAYS,
                )?,
            },
            modern_scopes: lookup("OAUTH_MODERN_SCOPES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.modern_scopes),
            authentication_backends: lookup("AUTHENTICATION_BACKENDS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.authentication_backends),
            social_auth_backends: lookup("SOCIAL_AUTH_BACKENDS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.social_auth_backends),
            session_cookie_name: lookup("SESSION_COOKIE_NAME")
                .unwrap_or(defaults.session_cookie_name),
            session_cookie_age_secs: parse_num(
                "SESSION_COOKIE_AGE_SECS",
                lookup("SESSION_COOKIE_AGE_SECS"),
                defaults.session_cookie_age_secs,
                MAX_SESSION_COOKIE_AGE_SECS,
            )?,
            session_cookie_secure: parse_bool(
                "SESSION_COOKIE_SECURE",
                lookup("SESSION_COOKIE_SECURE"),
                defaults.session_cookie_secure,
            )?,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}

/// Parse a non-negative integer no larger than `max`.
fn parse_num(
    var: &'static str,
    raw: Option<String>,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if (0..=max).contains(&n) => Ok(n),
            _ => Err(ConfigError::Invalid { var, value: raw }),
        },
    }
}
