//! In-memory store implementing every persistence trait.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use super::{
    ApplicationRecord, LegacyClientRecord, LegacyStore, LegacyTokenQuery, LegacyTokenRecord,
    ModernStore, ModernTokenQuery, ModernTokenRecord, RefreshTokenRecord, SessionStore,
    StoreError, UserStore,
};
use crate::models::auth::{SessionData, SocialLink, User, UserWithPassword};

/// Process-local store. Clients and tokens keep insertion order so lookups
/// that match several rows behave like an ordered table scan.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, UserWithPassword>,
    social_links: DashMap<(String, String), String>,
    legacy_clients: RwLock<Vec<LegacyClientRecord>>,
    legacy_tokens: RwLock<Vec<LegacyTokenRecord>>,
    applications: RwLock<Vec<ApplicationRecord>>,
    modern_tokens: RwLock<Vec<ModernTokenRecord>>,
    /// Keyed by the access token the refresh token belongs to.
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    sessions: DashMap<String, SessionData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a user, replacing any existing user with the same id.
    pub fn add_user(&self, user: User, password_hash: Option<String>) {
        self.users.insert(
            user.id.clone(),
            UserWithPassword {
                user,
                password_hash,
            },
        );
    }

    /// Link a social account to a user.
    pub fn link_social(&self, link: SocialLink) {
        self.social_links
            .insert((link.provider, link.uid), link.user_id);
    }

    /// Total number of access tokens held across both backends.
    pub async fn token_count(&self) -> usize {
        self.legacy_tokens.read().await.len() + self.modern_tokens.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(user_id).map(|entry| entry.user.clone()))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.user.username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_social_uid(
        &self,
        provider: &str,
        uid: &str,
    ) -> Result<Option<User>, StoreError> {
        let Some(user_id) = self
            .social_links
            .get(&(provider.to_string(), uid.to_string()))
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };
        self.get_user(&user_id).await
    }

    async fn has_social_link(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .social_links
            .iter()
            .any(|entry| entry.value() == user_id))
    }
}

#[async_trait]
impl LegacyStore for MemoryStore {
    async fn insert_client(&self, record: LegacyClientRecord) -> Result<(), StoreError> {
        let mut clients = self.legacy_clients.write().await;
        if clients.iter().any(|c| c.client_id == record.client_id) {
            return Err(StoreError::Conflict(format!(
                "client_id '{}' already exists",
                record.client_id
            )));
        }
        clients.push(record);
        Ok(())
    }

    async fn find_clients(
        &self,
        client_id: Option<&str>,
        client_type: Option<i16>,
    ) -> Result<Vec<LegacyClientRecord>, StoreError> {
        Ok(self
            .legacy_clients
            .read()
            .await
            .iter()
            .filter(|c| client_id.is_none_or(|id| c.client_id == id))
            .filter(|c| client_type.is_none_or(|t| c.client_type == t))
            .cloned()
            .collect())
    }

    async fn insert_token(&self, record: LegacyTokenRecord) -> Result<(), StoreError> {
        let mut tokens = self.legacy_tokens.write().await;
        if tokens.iter().any(|t| t.token == record.token) {
            return Err(StoreError::Conflict("duplicate access token".into()));
        }
        tokens.push(record);
        Ok(())
    }

    async fn insert_token_if_absent(
        &self,
        record: LegacyTokenRecord,
    ) -> Result<LegacyTokenRecord, StoreError> {
        // The write lock spans the check and the insert.
        let mut tokens = self.legacy_tokens.write().await;
        let query = LegacyTokenQuery {
            token: None,
            user_id: Some(record.user_id.clone()),
            client_id: Some(record.client_id.clone()),
            scope: Some(record.scope),
            live_at: record.created,
        };
        if let Some(existing) = tokens.iter().rev().find(|t| query.matches(t)) {
            return Ok(existing.clone());
        }
        tokens.push(record.clone());
        Ok(record)
    }

    async fn find_tokens(
        &self,
        query: &LegacyTokenQuery,
    ) -> Result<Vec<LegacyTokenRecord>, StoreError> {
        Ok(self
            .legacy_tokens
            .read()
            .await
            .iter()
            .rev()
            .filter(|t| query.matches(t))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ModernStore for MemoryStore {
    async fn insert_application(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        let mut applications = self.applications.write().await;
        if applications.iter().any(|a| a.client_id == record.client_id) {
            return Err(StoreError::Conflict(format!(
                "client_id '{}' already exists",
                record.client_id
            )));
        }
        applications.push(record);
        Ok(())
    }

    async fn find_applications(
        &self,
        client_id: Option<&str>,
        client_type: Option<&str>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self
            .applications
            .read()
            .await
            .iter()
            .filter(|a| client_id.is_none_or(|id| a.client_id == id))
            .filter(|a| client_type.is_none_or(|t| a.client_type == t))
            .cloned()
            .collect())
    }

    async fn insert_access_token(&self, record: ModernTokenRecord) -> Result<(), StoreError> {
        let mut tokens = self.modern_tokens.write().await;
        if tokens.iter().any(|t| t.token == record.token) {
            return Err(StoreError::Conflict("duplicate access token".into()));
        }
        tokens.push(record);
        Ok(())
    }

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        if self.refresh_tokens.contains_key(&record.access_token) {
            return Err(StoreError::Conflict(
                "access token already has a refresh token".into(),
            ));
        }
        self.refresh_tokens
            .insert(record.access_token.clone(), record);
        Ok(())
    }

    async fn find_access_tokens(
        &self,
        query: &ModernTokenQuery,
    ) -> Result<Vec<ModernTokenRecord>, StoreError> {
        Ok(self
            .modern_tokens
            .read()
            .await
            .iter()
            .rev()
            .filter(|t| query.matches(t))
            .cloned()
            .collect())
    }

    async fn find_refresh_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .refresh_tokens
            .get(access_token)
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, session: &SessionData) -> Result<(), StoreError> {
        self.sessions
            .insert(session.session_key.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, session_key: &str) -> Result<Option<SessionData>, StoreError> {
        let now = chrono::Utc::now();
        Ok(self
            .sessions
            .get(session_key)
            .map(|entry| entry.value().clone())
            .filter(|s| s.expires_at > now))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn legacy_token(token: &str, expires_in: Duration) -> LegacyTokenRecord {
        let now = Utc::now();
        LegacyTokenRecord {
            token: token.into(),
            user_id: "u1".into(),
            client_id: "c1".into(),
            scope: 0,
            created: now,
            expires: now + expires_in,
        }
    }

    #[tokio::test]
    async fn conditional_insert_returns_live_token() {
        let store = MemoryStore::new();
        let first = store
            .insert_token_if_absent(legacy_token("a", Duration::days(1)))
            .await
            .unwrap();
        let second = store
            .insert_token_if_absent(legacy_token("b", Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(first.token, "a");
        assert_eq!(second.token, "a");
        assert_eq!(store.token_count().await, 1);
    }

    #[tokio::test]
    async fn conditional_insert_ignores_expired_token() {
        let store = MemoryStore::new();
        store
            .insert_token(legacy_token("old", Duration::seconds(-1)))
            .await
            .unwrap();
        let inserted = store
            .insert_token_if_absent(legacy_token("new", Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(inserted.token, "new");
    }

    #[tokio::test]
    async fn duplicate_client_id_conflicts() {
        let store = MemoryStore::new();
        let record = LegacyClientRecord {
            client_id: "c1".into(),
            name: "app".into(),
            user_id: "u1".into(),
            url: String::new(),
            redirect_uri: "https://example.test/cb".into(),
            client_secret: String::new(),
            client_type: super::super::LEGACY_PUBLIC,
        };
        store.insert_client(record.clone()).await.unwrap();
        assert!(matches!(
            store.insert_client(record).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn social_lookup_resolves_linked_user() {
        let store = MemoryStore::new();
        let user = User {
            id: "u1".into(),
            username: "ada".into(),
            email: "ada@example.test".into(),
            is_active: true,
        };
        store.add_user(user.clone(), None);
        store.link_social(SocialLink {
            provider: "google-oauth2".into(),
            uid: "g-1".into(),
            user_id: "u1".into(),
        });
        assert_eq!(
            store.find_by_social_uid("google-oauth2", "g-1").await.unwrap(),
            Some(user)
        );
        assert!(store.find_by_social_uid("facebook", "g-1").await.unwrap().is_none());
        assert!(store.has_social_link("u1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_session_is_not_loaded() {
        let store = MemoryStore::new();
        let session = SessionData {
            session_key: "k".into(),
            user_id: "u1".into(),
            backend_path: "authx.backends.ModelBackend".into(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        store.save(&session).await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());
    }
}
