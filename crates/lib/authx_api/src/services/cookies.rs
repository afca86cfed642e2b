//! Session cookie construction.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::ApiConfig;

/// Build the httpOnly session cookie for `session_key`.
pub fn session_cookie(config: &ApiConfig, session_key: &str) -> Cookie<'static> {
    Cookie::build((config.session_cookie_name.clone(), session_key.to_string()))
        .http_only(true)
        .secure(config.session_cookie_secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(config.session_cookie_age_secs))
        .build()
}
