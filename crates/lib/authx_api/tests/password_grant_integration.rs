//! `POST /oauth2/access_token` with the password grant.

mod common;

use axum::http::StatusCode;

use authx_api::config::ApiConfig;
use common::{DOP_PUBLIC, DOT_PUBLIC, PASSWORD, spawn};

fn form(client_id: &str, username: &str, password: &str) -> String {
    format!("grant_type=password&client_id={client_id}&username={username}&password={password}")
}

#[tokio::test]
async fn password_grant_issues_from_the_owning_backend() {
    let app = spawn(ApiConfig::default()).await;

    let (status, body) = app
        .post_form("/oauth2/access_token", &form(DOT_PUBLIC, "ada", PASSWORD))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.get("refresh_token").is_some());

    let (status, body) = app
        .post_form("/oauth2/access_token", &form(DOP_PUBLIC, "carol", PASSWORD))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.get("refresh_token").is_none());
    assert_eq!(body["token_type"], "Bearer");
}

#[tokio::test]
async fn wrong_password_is_an_invalid_grant() {
    let app = spawn(ApiConfig::default()).await;
    let (status, body) = app
        .post_form("/oauth2/access_token", &form(DOT_PUBLIC, "ada", "nope"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("password").is_some(), "{body}");
    assert_eq!(app.store.token_count().await, 0);
}

#[tokio::test]
async fn other_grant_types_are_unsupported() {
    let app = spawn(ApiConfig::default()).await;
    let (status, body) = app
        .post_form(
            "/oauth2/access_token",
            "grant_type=client_credentials&client_id=dot-public",
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("grant_type").is_some(), "{body}");
}
