//! Session upgrade endpoint.

use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;

use authx_core::session;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::services::cookies::session_cookie;

/// `POST /oauth2/login`: start a server-side session for the bearer of the
/// request's access token. Responds `204` with the session cookie set.
pub async fn login_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> AppResult<(StatusCode, CookieJar)> {
    let max_age = Duration::try_seconds(state.config.session_cookie_age_secs)
        .ok_or_else(|| AppError::Internal("session cookie age is out of range".into()))?;
    let session = session::upgrade(
        state.sessions.as_ref(),
        &state.backends,
        &auth.user,
        auth.backend.as_deref(),
        max_age,
    )
    .await?;
    let cookie = session_cookie(&state.config, &session.session_key);
    Ok((StatusCode::NO_CONTENT, jar.add(cookie)))
}
