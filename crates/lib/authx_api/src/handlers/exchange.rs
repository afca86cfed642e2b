//! Third-party token exchange endpoints.

use axum::extract::{Path, State};
use axum::{Form, Json};
use serde_json::{Value, json};

use authx_core::exchange::{ExchangeForm, TokenResponse};
use authx_core::models::oauth::Backend;

use crate::AppState;
use crate::error::AppResult;

/// `POST /oauth2/exchange_access_token/{backend}`: exchange against the
/// backend that owns `client_id`. The third-party token is verified before
/// the owning backend is looked up.
pub async fn exchange_handler(
    State(state): State<AppState>,
    Path(social_backend): Path<String>,
    Form(form): Form<ExchangeForm>,
) -> AppResult<Json<TokenResponse>> {
    let verified = state.validator.verify(&social_backend, &form).await?;
    let backend = state
        .orchestrator
        .backend_for_client(form.client_id.as_deref())
        .await?;
    let adapter = state.orchestrator.adapter(backend);
    let request = state.validator.complete(verified, &form, adapter).await?;
    Ok(Json(state.orchestrator.exchange(request).await?))
}

/// `POST /oauth2/dop/exchange_access_token/{backend}`
pub async fn legacy_exchange_handler(
    State(state): State<AppState>,
    Path(social_backend): Path<String>,
    Form(form): Form<ExchangeForm>,
) -> AppResult<Json<TokenResponse>> {
    exchange(&state, Backend::Legacy, &social_backend, &form).await
}

/// `GET /oauth2/dop/exchange_access_token/{backend}`: empty pass-through.
pub async fn legacy_exchange_get_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.orchestrator.check_get(Backend::Legacy)?;
    Ok(Json(json!({})))
}

/// `POST /oauth2/dot/exchange_access_token/{backend}`
pub async fn modern_exchange_handler(
    State(state): State<AppState>,
    Path(social_backend): Path<String>,
    Form(form): Form<ExchangeForm>,
) -> AppResult<Json<TokenResponse>> {
    exchange(&state, Backend::Modern, &social_backend, &form).await
}

/// `GET /oauth2/dot/exchange_access_token/{backend}`: always rejected.
pub async fn modern_exchange_get_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.orchestrator.check_get(Backend::Modern)?;
    Ok(Json(json!({})))
}

async fn exchange(
    state: &AppState,
    backend: Backend,
    social_backend: &str,
    form: &ExchangeForm,
) -> AppResult<Json<TokenResponse>> {
    let adapter = state.orchestrator.adapter(backend);
    let request = state.validator.validate(social_backend, form, adapter).await?;
    Ok(Json(state.orchestrator.exchange(request).await?))
}
