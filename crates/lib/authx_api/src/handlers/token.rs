//! Password grant endpoint.

use axum::extract::State;
use axum::{Form, Json};

use authx_core::exchange::{PasswordGrantForm, PasswordGrantValidator, TokenResponse};

use crate::AppState;
use crate::error::AppResult;

/// `POST /oauth2/access_token`: `grant_type=password`, issued by the backend
/// that owns `client_id`.
pub async fn access_token_handler(
    State(state): State<AppState>,
    Form(form): Form<PasswordGrantForm>,
) -> AppResult<Json<TokenResponse>> {
    PasswordGrantValidator::check_grant_type(&form)?;
    let backend = state
        .orchestrator
        .backend_for_client(form.client_id.as_deref())
        .await?;
    let request = state
        .password_grant
        .validate(&form, state.orchestrator.adapter(backend))
        .await?;
    Ok(Json(state.orchestrator.exchange(request).await?))
}
