//! Shared fixtures for the router-level tests: an in-memory store with a few
//! users and clients, and a social provider that accepts `valid:<uid>` tokens.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;

use authx_api::config::ApiConfig;
use authx_api::{AppState, Stores};
use authx_core::adapters::OAuthAdapter;
use authx_core::auth::password::hash_password;
use authx_core::models::auth::{SocialIdentity, SocialLink, User};
use authx_core::models::oauth::Backend;
use authx_core::social::{SocialError, SocialStrategy, StrategyRegistry};
use authx_core::store::MemoryStore;

pub const PROVIDER: &str = "google-oauth2";
pub const PASSWORD: &str = "s3cret";

pub const DOP_PUBLIC: &str = "dop-public";
pub const DOP_CONFIDENTIAL: &str = "dop-confidential";
pub const DOT_PUBLIC: &str = "dot-public";

pub struct FakeProvider;

#[async_trait]
impl SocialStrategy for FakeProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn user_data(&self, access_token: &str) -> Result<SocialIdentity, SocialError> {
        let uid = access_token
            .strip_prefix("valid:")
            .ok_or_else(|| SocialError::InvalidToken("The access token is invalid".into()))?;
        Ok(SocialIdentity {
            provider: PROVIDER.into(),
            uid: uid.into(),
            email: None,
        })
    }
}

pub fn user(id: &str, is_active: bool) -> User {
    User {
        id: id.into(),
        username: id.into(),
        email: format!("{id}@example.test"),
        is_active,
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

/// `ada` is active and linked to `g-ada`; `bob` is inactive and linked to
/// `g-bob`; `carol` is active with no social link.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (id, active) in [("ada", true), ("bob", false), ("carol", true)] {
        store.add_user(user(id, active), Some(hash_password(PASSWORD).unwrap()));
    }
    for (uid, user_id) in [("g-ada", "ada"), ("g-bob", "bob")] {
        store.link_social(SocialLink {
            provider: PROVIDER.into(),
            uid: uid.into(),
            user_id: user_id.into(),
        });
    }
    store
}

pub fn strategies() -> StrategyRegistry {
    StrategyRegistry::new().with(Arc::new(FakeProvider))
}

/// Provision the public and confidential test clients, owned by `ada`.
pub async fn seed_clients(state: &AppState) {
    let owner = user("ada", true);
    let legacy = state.orchestrator.adapter(Backend::Legacy);
    legacy
        .create_public_client("mobile", &owner, Some(DOP_PUBLIC), "https://example.test/cb")
        .await
        .unwrap();
    legacy
        .create_confidential_client(&owner, Some(DOP_CONFIDENTIAL))
        .await
        .unwrap();
    state
        .orchestrator
        .adapter(Backend::Modern)
        .create_public_client("mobile", &owner, Some(DOT_PUBLIC), "https://example.test/cb")
        .await
        .unwrap();
}

pub async fn spawn(config: ApiConfig) -> TestApp {
    let store = seeded_store();
    let state = AppState::new(config, Stores::shared(store.clone()), strategies()).unwrap();
    seed_clients(&state).await;

    TestApp {
        router: authx_api::router(state.clone()),
        store,
        state,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        json_response(self.send(request).await).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        json_response(self.send(request).await).await
    }

    /// Exchange `valid:<uid>` on the legacy or modern path.
    pub async fn exchange(
        &self,
        path: &str,
        uid: &str,
        client_id: &str,
        scope: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut body = format!("access_token=valid:{uid}&client_id={client_id}");
        if let Some(scope) = scope {
            body.push_str(&format!("&scope={}", scope.replace(' ', "+")));
        }
        self.post_form(&format!("/oauth2/{path}/{PROVIDER}"), &body).await
    }
}

pub async fn json_response(response: Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}
