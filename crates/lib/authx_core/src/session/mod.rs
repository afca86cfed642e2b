//! Session upgrade: turn a bearer-authenticated request into a server-side
//! session.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::backends::AuthBackend;
use crate::auth::tokens::generate_token;
use crate::models::auth::{SessionData, User};
use crate::store::{SessionStore, StoreError};

/// Length of generated session keys.
pub const SESSION_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No authentication backend recognizes user {0}")]
    NoBackend(String),

    #[error("Session lifetime is out of range")]
    LifetimeOutOfRange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Dotted path of the first backend, in configured order, that recognizes
/// `user_id`.
pub async fn resolve_backend_path(
    backends: &[Arc<dyn AuthBackend>],
    user_id: &str,
) -> Result<Option<String>, StoreError> {
    for backend in backends {
        if backend.get_user(user_id).await?.is_some() {
            debug!(user_id, backend = backend.path(), "backend recognized user");
            return Ok(Some(backend.path().to_string()));
        }
    }
    Ok(None)
}

/// Create and persist a session for `user` under `backend_path`.
pub async fn login(
    store: &dyn SessionStore,
    user: &User,
    backend_path: &str,
    max_age: Duration,
) -> Result<SessionData, SessionError> {
    let expires_at = Utc::now()
        .checked_add_signed(max_age)
        .ok_or(SessionError::LifetimeOutOfRange)?;
    let session = SessionData {
        session_key: generate_token(SESSION_KEY_LEN),
        user_id: user.id.clone(),
        backend_path: backend_path.to_string(),
        expires_at,
    };
    store.save(&session).await?;
    info!(user_id = %user.id, backend = backend_path, "session created");
    Ok(session)
}

/// Resolve the backend path when the caller did not authenticate through one,
/// then log the user in.
pub async fn upgrade(
    store: &dyn SessionStore,
    backends: &[Arc<dyn AuthBackend>],
    user: &User,
    backend_path: Option<&str>,
    max_age: Duration,
) -> Result<SessionData, SessionError> {
    let backend_path = match backend_path {
        Some(path) => path.to_string(),
        None => resolve_backend_path(backends, &user.id)
            .await?
            .ok_or_else(|| SessionError::NoBackend(user.id.clone()))?,
    };
    login(store, user, &backend_path, max_age).await
}
