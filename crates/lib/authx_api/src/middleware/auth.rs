//! Bearer authentication against issued first-party tokens.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use authx_core::adapters::AdapterError;
use authx_core::models::auth::User;
use authx_core::models::oauth::{Backend, TokenFilter};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Stored in request extensions by [`require_bearer`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// Authentication backend the user was recognized by, when known. Bearer
    /// authentication never sets it.
    pub backend: Option<String>,
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, resolves the
/// token through the modern then the legacy backend, and injects
/// `AuthenticatedUser` into request extensions.
///
/// Inactive users are let through.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let user = authenticate_token(&state, token).await?;
    request
        .extensions_mut()
        .insert(AuthenticatedUser { user, backend: None });

    Ok(next.run(request).await)
}

async fn authenticate_token(state: &AppState, token: &str) -> AppResult<User> {
    let filter = TokenFilter::by_token(token);
    for backend in [Backend::Modern, Backend::Legacy] {
        let access_token = match state.orchestrator.adapter(backend).get_access_token(&filter).await {
            Ok(access_token) => access_token,
            Err(AdapterError::TokenNotFound) => continue,
            Err(e) => return Err(e.into()),
        };
        debug!(backend = %backend, user_id = %access_token.user_id, "bearer token accepted");
        return state
            .users
            .get_user(&access_token.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()));
    }
    Err(AppError::Unauthorized("Invalid or expired token".into()))
}
