//! PostgreSQL store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{
    ApplicationRecord, LegacyClientRecord, LegacyStore, LegacyTokenQuery, LegacyTokenRecord,
    ModernStore, ModernTokenQuery, ModernTokenRecord, RefreshTokenRecord, SessionStore,
    StoreError, UserStore,
};
use crate::models::auth::{SessionData, User, UserWithPassword};

/// Map unique-constraint violations to [`StoreError::Conflict`].
fn conflict_or_db(e: sqlx::Error, what: &str) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Conflict(what.to_string()),
        _ => StoreError::DbError(e),
    }
}

/// Row ids are UUIDv7 so `ORDER BY id` follows insertion order.
fn uuidv7() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

/// sqlx-backed store over the tables created by `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, bool)>(
            "SELECT id::text, username, email, is_active FROM users WHERE id = $1::uuid",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, username, email, is_active)| User {
            id,
            username,
            email,
            is_active,
        }))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, bool, Option<String>)>(
            "SELECT id::text, username, email, is_active, password_hash \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(
            |(id, username, email, is_active, password_hash)| UserWithPassword {
                user: User {
                    id,
                    username,
                    email,
                    is_active,
                },
                password_hash,
            },
        ))
    }

    async fn find_by_social_uid(
        &self,
        provider: &str,
        uid: &str,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, bool)>(
            "SELECT u.id::text, u.username, u.email, u.is_active \
             FROM user_social_auth s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.provider = $1 AND s.uid = $2",
        )
        .bind(provider)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, username, email, is_active)| User {
            id,
            username,
            email,
            is_active,
        }))
    }

    async fn has_social_link(&self, user_id: &str) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_social_auth WHERE user_id = $1::uuid)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl LegacyStore for PgStore {
    async fn insert_client(&self, record: LegacyClientRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth2_client \
             (id, client_id, name, user_id, url, redirect_uri, client_secret, client_type) \
             VALUES ($1, $2, $3, $4::uuid, $5, $6, $7, $8)",
        )
        .bind(uuidv7())
        .bind(&record.client_id)
        .bind(&record.name)
        .bind(&record.user_id)
        .bind(&record.url)
        .bind(&record.redirect_uri)
        .bind(&record.client_secret)
        .bind(record.client_type)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, &format!("client_id '{}' already exists", record.client_id)))?;
        Ok(())
    }

    async fn find_clients(
        &self,
        client_id: Option<&str>,
        client_type: Option<i16>,
    ) -> Result<Vec<LegacyClientRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LegacyClientRecord>(
            "SELECT client_id, name, user_id::text AS user_id, url, redirect_uri, \
                    client_secret, client_type \
             FROM oauth2_client \
             WHERE ($1::text IS NULL OR client_id = $1) \
               AND ($2::smallint IS NULL OR client_type = $2) \
             ORDER BY id",
        )
        .bind(client_id)
        .bind(client_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_token(&self, record: LegacyTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth2_accesstoken \
             (id, token, user_id, client_id, scope, created, expires) \
             VALUES ($1, $2, $3::uuid, $4, $5, $6, $7)",
        )
        .bind(uuidv7())
        .bind(&record.token)
        .bind(&record.user_id)
        .bind(&record.client_id)
        .bind(record.scope)
        .bind(record.created)
        .bind(record.expires)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "duplicate access token"))?;
        Ok(())
    }

    async fn insert_token_if_absent(
        &self,
        record: LegacyTokenRecord,
    ) -> Result<LegacyTokenRecord, StoreError> {
        // Single statement: the insert only happens when no live token exists
        // for the same (user, client, scope).
        let inserted = sqlx::query(
            "INSERT INTO oauth2_accesstoken \
             (id, token, user_id, client_id, scope, created, expires) \
             SELECT $1, $2, $3::uuid, $4, $5, $6, $7 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM oauth2_accesstoken \
                 WHERE user_id = $3::uuid AND client_id = $4 AND scope = $5 AND expires > $6 \
             )",
        )
        .bind(uuidv7())
        .bind(&record.token)
        .bind(&record.user_id)
        .bind(&record.client_id)
        .bind(record.scope)
        .bind(record.created)
        .bind(record.expires)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "duplicate access token"))?
        .rows_affected();

        if inserted == 1 {
            return Ok(record);
        }

        let query = LegacyTokenQuery {
            token: None,
            user_id: Some(record.user_id.clone()),
            client_id: Some(record.client_id.clone()),
            scope: Some(record.scope),
            live_at: record.created,
        };
        match self.find_tokens(&query).await?.into_iter().next() {
            Some(existing) => Ok(existing),
            // The live token expired between the two statements.
            None => {
                self.insert_token(record.clone()).await?;
                Ok(record)
            }
        }
    }

    async fn find_tokens(
        &self,
        query: &LegacyTokenQuery,
    ) -> Result<Vec<LegacyTokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LegacyTokenRecord>(
            "SELECT token, user_id::text AS user_id, client_id, scope, created, expires \
             FROM oauth2_accesstoken \
             WHERE expires > $1 \
               AND ($2::text IS NULL OR token = $2) \
               AND ($3::text IS NULL OR user_id = $3::uuid) \
               AND ($4::text IS NULL OR client_id = $4) \
               AND ($5::integer IS NULL OR scope = $5) \
             ORDER BY created DESC",
        )
        .bind(query.live_at)
        .bind(query.token.as_deref())
        .bind(query.user_id.as_deref())
        .bind(query.client_id.as_deref())
        .bind(query.scope)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ModernStore for PgStore {
    async fn insert_application(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth2_provider_application \
             (id, client_id, name, user_id, client_type, authorization_grant_type, \
              client_secret, redirect_uris, skip_authorization) \
             VALUES ($1, $2, $3, $4::uuid, $5, $6, $7, $8, $9)",
        )
        .bind(uuidv7())
        .bind(&record.client_id)
        .bind(&record.name)
        .bind(&record.user_id)
        .bind(&record.client_type)
        .bind(&record.authorization_grant_type)
        .bind(&record.client_secret)
        .bind(&record.redirect_uris)
        .bind(record.skip_authorization)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, &format!("client_id '{}' already exists", record.client_id)))?;
        Ok(())
    }

    async fn find_applications(
        &self,
        client_id: Option<&str>,
        client_type: Option<&str>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ApplicationRecord>(
            "SELECT client_id, name, user_id::text AS user_id, client_type, \
                    authorization_grant_type, client_secret, redirect_uris, skip_authorization \
             FROM oauth2_provider_application \
             WHERE ($1::text IS NULL OR client_id = $1) \
               AND ($2::text IS NULL OR client_type = $2) \
             ORDER BY id",
        )
        .bind(client_id)
        .bind(client_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_access_token(&self, record: ModernTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth2_provider_accesstoken \
             (id, token, user_id, application_id, scope, created, expires) \
             VALUES ($1, $2, $3::uuid, $4, $5, $6, $7)",
        )
        .bind(uuidv7())
        .bind(&record.token)
        .bind(&record.user_id)
        .bind(&record.application_id)
        .bind(&record.scope)
        .bind(record.created)
        .bind(record.expires)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "duplicate access token"))?;
        Ok(())
    }

    async fn insert_refresh_token(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO oauth2_provider_refreshtoken \
             (id, token, access_token, user_id, application_id, created) \
             VALUES ($1, $2, $3, $4::uuid, $5, $6)",
        )
        .bind(uuidv7())
        .bind(&record.token)
        .bind(&record.access_token)
        .bind(&record.user_id)
        .bind(&record.application_id)
        .bind(record.created)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "access token already has a refresh token"))?;
        Ok(())
    }

    async fn find_access_tokens(
        &self,
        query: &ModernTokenQuery,
    ) -> Result<Vec<ModernTokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ModernTokenRecord>(
            "SELECT token, user_id::text AS user_id, application_id, scope, created, expires \
             FROM oauth2_provider_accesstoken \
             WHERE expires > $1 \
               AND ($2::text IS NULL OR token = $2) \
               AND ($3::text IS NULL OR user_id = $3::uuid) \
               AND ($4::text IS NULL OR application_id = $4) \
               AND ($5::text IS NULL OR scope = $5) \
             ORDER BY created DESC",
        )
        .bind(query.live_at)
        .bind(query.token.as_deref())
        .bind(query.user_id.as_deref())
        .bind(query.application_id.as_deref())
        .bind(query.scope.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_refresh_token(
        &self,
        access_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT token, access_token, user_id::text AS user_id, application_id, created \
             FROM oauth2_provider_refreshtoken \
             WHERE access_token = $1",
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn save(&self, session: &SessionData) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions (session_key, user_id, backend_path, expire_date) \
             VALUES ($1, $2::uuid, $3, $4) \
             ON CONFLICT (session_key) DO UPDATE \
             SET user_id = EXCLUDED.user_id, \
                 backend_path = EXCLUDED.backend_path, \
                 expire_date = EXCLUDED.expire_date",
        )
        .bind(&session.session_key)
        .bind(&session.user_id)
        .bind(&session.backend_path)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, session_key: &str) -> Result<Option<SessionData>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, chrono::DateTime<chrono::Utc>)>(
            "SELECT session_key, user_id::text, backend_path, expire_date \
             FROM sessions \
             WHERE session_key = $1 AND expire_date > now()",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(session_key, user_id, backend_path, expires_at)| SessionData {
            session_key,
            user_id,
            backend_path,
            expires_at,
        }))
    }
}
