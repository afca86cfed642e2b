//! Authentication backends.
//!
//! A backend is identified by a dotted path. The session layer records the
//! path of the backend that recognized the user so later requests can reload
//! the user through the same backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::auth::User;
use crate::store::{StoreError, UserStore};

pub const MODEL_BACKEND: &str = "authx.backends.ModelBackend";
pub const ALLOW_ALL_USERS_MODEL_BACKEND: &str = "authx.backends.AllowAllUsersModelBackend";
pub const SOCIAL_AUTH_BACKEND: &str = "authx.backends.SocialAuthBackend";

/// A source of users that can reload a user by id.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Dotted path recorded in the session.
    fn path(&self) -> &str;

    /// Return the user if this backend recognizes `user_id`.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;
}

/// Users from the user directory. Inactive users are only recognized when
/// `allow_inactive` is set.
pub struct ModelBackend {
    users: Arc<dyn UserStore>,
    allow_inactive: bool,
}

impl ModelBackend {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            allow_inactive: false,
        }
    }

    pub fn allow_all_users(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            allow_inactive: true,
        }
    }
}

#[async_trait]
impl AuthBackend for ModelBackend {
    fn path(&self) -> &str {
        if self.allow_inactive {
            ALLOW_ALL_USERS_MODEL_BACKEND
        } else {
            MODEL_BACKEND
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let user = self.users.get_user(user_id).await?;
        Ok(user.filter(|u| self.allow_inactive || u.is_active))
    }
}

/// Users with at least one linked social account.
pub struct SocialAuthBackend {
    users: Arc<dyn UserStore>,
}

impl SocialAuthBackend {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl AuthBackend for SocialAuthBackend {
    fn path(&self) -> &str {
        SOCIAL_AUTH_BACKEND
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        if !self.users.has_social_link(user_id).await? {
            return Ok(None);
        }
        self.users.get_user(user_id).await
    }
}

/// Build backends from their configured paths, preserving order.
/// Unknown paths are returned as the error value.
pub fn load_backends(
    paths: &[String],
    users: Arc<dyn UserStore>,
) -> Result<Vec<Arc<dyn AuthBackend>>, String> {
    paths
        .iter()
        .map(|path| -> Result<Arc<dyn AuthBackend>, String> {
            match path.as_str() {
                MODEL_BACKEND => Ok(Arc::new(ModelBackend::new(users.clone()))),
                ALLOW_ALL_USERS_MODEL_BACKEND => {
                    Ok(Arc::new(ModelBackend::allow_all_users(users.clone())))
                }
                SOCIAL_AUTH_BACKEND => Ok(Arc::new(SocialAuthBackend::new(users.clone()))),
                other => Err(other.to_string()),
            }
        })
        .collect()
}
