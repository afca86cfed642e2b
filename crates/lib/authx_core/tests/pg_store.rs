//! PostgreSQL store tests.
//!
//! Run against a scratch database:
//! `AUTHX_TEST_DATABASE_URL=postgres://localhost/authx_test cargo test -p authx_core -- --ignored`

use std::sync::Arc;

use chrono::{Duration, SubsecRound, Utc};
use sqlx::PgPool;

use authx_core::adapters::{AdapterError, LegacyAdapter, ModernAdapter, OAuthAdapter};
use authx_core::models::auth::{SessionData, User};
use authx_core::models::oauth::{TokenFilter, TokenLifetimes};
use authx_core::scope::Scope;
use authx_core::store::{
    APPLICATION_PUBLIC, ApplicationRecord, LEGACY_PUBLIC, LegacyClientRecord, LegacyStore,
    LegacyTokenQuery, LegacyTokenRecord, ModernStore, ModernTokenQuery, ModernTokenRecord,
    PgStore, SessionStore, StoreError, UserStore,
};

async fn store() -> PgStore {
    let url = std::env::var("AUTHX_TEST_DATABASE_URL").expect("AUTHX_TEST_DATABASE_URL");
    let pool = PgPool::connect(&url).await.expect("connect to test database");
    authx_core::migrate::migrate(&pool).await.expect("migrations");
    PgStore::new(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

async fn insert_user(store: &PgStore, is_active: bool) -> User {
    let username = unique("user");
    let id = sqlx::query_scalar::<_, String>(
        "INSERT INTO users (username, email, is_active) VALUES ($1, $2, $3) RETURNING id::text",
    )
    .bind(&username)
    .bind(format!("{username}@example.test"))
    .bind(is_active)
    .fetch_one(store.pool())
    .await
    .expect("insert user");
    User {
        id,
        username: username.clone(),
        email: format!("{username}@example.test"),
        is_active,
    }
}

fn legacy_client(client_id: &str, user: &User) -> LegacyClientRecord {
    LegacyClientRecord {
        client_id: client_id.into(),
        name: "app".into(),
        user_id: user.id.clone(),
        url: String::new(),
        redirect_uri: "https://example.test/cb".into(),
        client_secret: "secret".into(),
        client_type: LEGACY_PUBLIC,
    }
}

fn application(client_id: &str, user: &User) -> ApplicationRecord {
    ApplicationRecord {
        client_id: client_id.into(),
        name: "app".into(),
        user_id: user.id.clone(),
        client_type: APPLICATION_PUBLIC.into(),
        authorization_grant_type: "password".into(),
        client_secret: "secret".into(),
        redirect_uris: "https://example.test/cb".into(),
        skip_authorization: false,
    }
}

fn legacy_token(user: &User, client_id: &str, expires_in: Duration) -> LegacyTokenRecord {
    let now = Utc::now().trunc_subsecs(6);
    LegacyTokenRecord {
        token: unique("tok"),
        user_id: user.id.clone(),
        client_id: client_id.into(),
        scope: 1,
        created: now,
        expires: now + expires_in,
    }
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn legacy_token_is_found_until_it_expires() {
    let store = Arc::new(store().await);
    let user = insert_user(&store, true).await;
    let adapter = LegacyAdapter::new(store.clone(), TokenLifetimes::default());
    let client = adapter
        .create_public_client("app", &user, Some(&unique("dop")), "https://example.test/cb")
        .await
        .unwrap();

    let token = adapter
        .create_access_token(&user, &Scope::empty(), &client)
        .await
        .unwrap();
    let found = adapter
        .get_access_token(&TokenFilter::by_token(token.token.clone()))
        .await
        .unwrap();
    assert_eq!(found.token, token.token);
    assert_eq!(found.user_id, user.id);
    assert_eq!(found.client_id, client.client_id);

    let expired = legacy_token(&user, &client.client_id, -Duration::seconds(1));
    store.insert_token(expired.clone()).await.unwrap();
    assert!(matches!(
        adapter.get_access_token(&TokenFilter::by_token(expired.token)).await,
        Err(AdapterError::TokenNotFound)
    ));

    let later = LegacyTokenQuery {
        token: Some(token.token),
        user_id: None,
        client_id: None,
        scope: None,
        live_at: Utc::now() + Duration::days(31),
    };
    assert!(store.find_tokens(&later).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn conditional_insert_returns_the_live_token() {
    let store = store().await;
    let user = insert_user(&store, true).await;
    let client_id = unique("dop");
    store.insert_client(legacy_client(&client_id, &user)).await.unwrap();

    let first = legacy_token(&user, &client_id, Duration::days(1));
    let stored = store.insert_token_if_absent(first.clone()).await.unwrap();
    assert_eq!(stored.token, first.token);

    let second = legacy_token(&user, &client_id, Duration::days(1));
    let stored = store.insert_token_if_absent(second.clone()).await.unwrap();
    assert_eq!(stored.token, first.token);

    let query = LegacyTokenQuery {
        token: None,
        user_id: Some(user.id.clone()),
        client_id: Some(client_id.clone()),
        scope: Some(1),
        live_at: Utc::now(),
    };
    assert_eq!(store.find_tokens(&query).await.unwrap().len(), 1);

    // A different scope is a different grant.
    let other_scope = LegacyTokenRecord {
        scope: 2,
        ..legacy_token(&user, &client_id, Duration::days(1))
    };
    let stored = store.insert_token_if_absent(other_scope.clone()).await.unwrap();
    assert_eq!(stored.token, other_scope.token);
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn conditional_insert_ignores_expired_tokens() {
    let store = store().await;
    let user = insert_user(&store, true).await;
    let client_id = unique("dop");
    store.insert_client(legacy_client(&client_id, &user)).await.unwrap();

    let stale = legacy_token(&user, &client_id, -Duration::seconds(1));
    store.insert_token(stale.clone()).await.unwrap();

    let fresh = legacy_token(&user, &client_id, Duration::days(1));
    let stored = store.insert_token_if_absent(fresh.clone()).await.unwrap();
    assert_eq!(stored.token, fresh.token);
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn duplicate_client_ids_conflict() {
    let store = Arc::new(store().await);
    let user = insert_user(&store, true).await;

    let dop = unique("dop");
    store.insert_client(legacy_client(&dop, &user)).await.unwrap();
    assert!(matches!(
        store.insert_client(legacy_client(&dop, &user)).await,
        Err(StoreError::Conflict(_))
    ));

    let dot = unique("dot");
    store.insert_application(application(&dot, &user)).await.unwrap();
    assert!(matches!(
        store.insert_application(application(&dot, &user)).await,
        Err(StoreError::Conflict(_))
    ));

    let adapter = ModernAdapter::new(store.clone(), TokenLifetimes::default());
    let clash = adapter
        .create_public_client("other", &user, Some(&dot), "https://example.test/cb")
        .await;
    assert!(matches!(clash, Err(AdapterError::DuplicateClient(_))));
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn modern_tokens_carry_refresh_tokens_until_expiry() {
    let store = Arc::new(store().await);
    let user = insert_user(&store, true).await;
    let adapter = ModernAdapter::new(store.clone(), TokenLifetimes::default());
    let client = adapter
        .create_public_client("app", &user, Some(&unique("dot")), "https://example.test/cb")
        .await
        .unwrap();
    let scope = Scope::from_names(["openid", "email"]).unwrap();

    let token = adapter
        .create_access_token(&user, &scope, &client)
        .await
        .unwrap();
    let found = adapter
        .get_access_token(&TokenFilter::for_grant(&user.id, &client.client_id, &scope))
        .await
        .unwrap();
    assert_eq!(found.token, token.token);
    assert_eq!(found.refresh_token, token.refresh_token);
    assert!(found.refresh_token.is_some());

    let now = Utc::now().trunc_subsecs(6);
    let expired = ModernTokenRecord {
        token: unique("tok"),
        user_id: user.id.clone(),
        application_id: client.client_id.clone(),
        scope: scope.to_string(),
        created: now - Duration::days(2),
        expires: now - Duration::days(1),
    };
    store.insert_access_token(expired.clone()).await.unwrap();
    let query = ModernTokenQuery {
        token: Some(expired.token),
        user_id: None,
        application_id: None,
        scope: None,
        live_at: Utc::now(),
    };
    assert!(store.find_access_tokens(&query).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn users_resolve_through_social_links() {
    let store = store().await;
    let linked = insert_user(&store, true).await;
    let unlinked = insert_user(&store, false).await;
    let uid = unique("uid");
    sqlx::query("INSERT INTO user_social_auth (provider, uid, user_id) VALUES ($1, $2, $3::uuid)")
        .bind("github")
        .bind(&uid)
        .bind(&linked.id)
        .execute(store.pool())
        .await
        .unwrap();

    assert_eq!(store.get_user(&linked.id).await.unwrap(), Some(linked.clone()));
    assert_eq!(
        store.find_by_social_uid("github", &uid).await.unwrap(),
        Some(linked.clone())
    );
    assert!(store.find_by_social_uid("facebook", &uid).await.unwrap().is_none());
    assert!(store.has_social_link(&linked.id).await.unwrap());
    assert!(!store.has_social_link(&unlinked.id).await.unwrap());

    let with_password = store.find_by_username(&unlinked.username).await.unwrap().unwrap();
    assert!(!with_password.user.is_active);
    assert!(with_password.password_hash.is_none());
}

#[tokio::test]
#[ignore = "requires AUTHX_TEST_DATABASE_URL"]
async fn sessions_load_until_they_expire() {
    let store = store().await;
    let user = insert_user(&store, true).await;
    let session = SessionData {
        session_key: unique("sess"),
        user_id: user.id.clone(),
        backend_path: "auth.backends.ModelBackend".into(),
        expires_at: Utc::now().trunc_subsecs(6) + Duration::hours(1),
    };
    store.save(&session).await.unwrap();
    assert_eq!(store.load(&session.session_key).await.unwrap(), Some(session.clone()));

    let expired = SessionData {
        expires_at: Utc::now() - Duration::seconds(1),
        ..session
    };
    store.save(&expired).await.unwrap();
    assert!(store.load(&expired.session_key).await.unwrap().is_none());
}
