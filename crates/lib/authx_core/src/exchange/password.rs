//! Resource owner password grant.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::validator::{resolve_client, resolve_scope};
use super::{ExchangeError, ExchangeRequest, required};
use crate::adapters::OAuthAdapter;
use crate::auth::AuthError;
use crate::auth::password::check_password;
use crate::store::UserStore;

const GRANT_TYPE_PASSWORD: &str = "password";
const INVALID_CREDENTIALS: &str = "Invalid username or password.";

/// Raw password grant form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordGrantForm {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
}

/// Checks username and password against the user store and produces the same
/// [`ExchangeRequest`] a social exchange would.
pub struct PasswordGrantValidator {
    users: Arc<dyn UserStore>,
}

impl PasswordGrantValidator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Reject anything but `grant_type=password`.
    pub fn check_grant_type(form: &PasswordGrantForm) -> Result<(), ExchangeError> {
        let grant_type = required(&form.grant_type, "grant_type")?;
        if grant_type != GRANT_TYPE_PASSWORD {
            return Err(ExchangeError::UnsupportedGrantType(format!(
                "'{grant_type}' is not a supported grant type"
            )));
        }
        Ok(())
    }

    pub async fn validate(
        &self,
        form: &PasswordGrantForm,
        adapter: &dyn OAuthAdapter,
    ) -> Result<ExchangeRequest, ExchangeError> {
        Self::check_grant_type(form)?;
        let client = resolve_client(adapter, &form.client_id).await?;
        let username = required(&form.username, "username")?;
        let password = form
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ExchangeError::MissingField("password"))?;
        let scope = resolve_scope(adapter, form.scope.as_deref())?;

        let Some(found) = self.users.find_by_username(username).await? else {
            warn!(username, "password grant for unknown user");
            return Err(ExchangeError::InvalidGrant(INVALID_CREDENTIALS.to_string()));
        };
        match check_password(password, found.password_hash.as_deref()) {
            Ok(()) => {}
            Err(AuthError::CredentialError) => {
                warn!(username, "password grant with wrong password");
                return Err(ExchangeError::InvalidGrant(INVALID_CREDENTIALS.to_string()));
            }
            Err(AuthError::Internal(msg)) => return Err(ExchangeError::Internal(msg)),
        }
        if !found.user.is_active {
            return Err(ExchangeError::InvalidGrant(
                "User account is disabled".to_string(),
            ));
        }

        Ok(ExchangeRequest::new(found.user, scope, client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ModernAdapter;
    use crate::auth::password::hash_password;
    use crate::models::auth::User;
    use crate::models::oauth::TokenLifetimes;
    use crate::store::MemoryStore;

    async fn setup() -> (PasswordGrantValidator, ModernAdapter) {
        let store = Arc::new(MemoryStore::new());
        let ada = User {
            id: "ada".into(),
            username: "ada".into(),
            email: "ada@example.test".into(),
            is_active: true,
        };
        let eve = User {
            id: "eve".into(),
            username: "eve".into(),
            email: "eve@example.test".into(),
            is_active: false,
        };
        store.add_user(ada.clone(), Some(hash_password("s3cret").unwrap()));
        store.add_user(eve, Some(hash_password("s3cret").unwrap()));

        let modern = ModernAdapter::new(store.clone(), TokenLifetimes::default());
        modern
            .create_public_client("dot", &ada, Some("dot-public"), "https://example.test")
            .await
            .unwrap();
        (PasswordGrantValidator::new(store), modern)
    }

    fn form(grant_type: &str, username: &str, password: &str) -> PasswordGrantForm {
        PasswordGrantForm {
            grant_type: Some(grant_type.into()),
            client_id: Some("dot-public".into()),
            username: Some(username.into()),
            password: Some(password.into()),
            scope: Some("openid profile".into()),
        }
    }

    #[tokio::test]
    async fn valid_credentials_produce_a_request() {
        let (validator, modern) = setup().await;
        let request = validator
            .validate(&form("password", "ada", "s3cret"), &modern)
            .await
            .unwrap();
        assert_eq!(request.user().id, "ada");
        assert_eq!(request.scope().to_string(), "openid profile");
    }

    #[tokio::test]
    async fn only_the_password_grant_is_supported() {
        let (validator, modern) = setup().await;
        let err = validator
            .validate(&form("client_credentials", "ada", "s3cret"), &modern)
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("grant_type"));
    }

    #[tokio::test]
    async fn bad_credentials_and_inactive_users_are_invalid_grants() {
        let (validator, modern) = setup().await;
        for (username, password) in [("ada", "wrong"), ("nobody", "s3cret"), ("eve", "s3cret")] {
            let err = validator
                .validate(&form("password", username, password), &modern)
                .await
                .unwrap_err();
            assert!(matches!(err, ExchangeError::InvalidGrant(_)), "{username}");
        }
    }

    #[tokio::test]
    async fn missing_password_is_a_field_error() {
        let (validator, modern) = setup().await;
        let mut form = form("password", "ada", "");
        form.password = None;
        let err = validator.validate(&form, &modern).await.unwrap_err();
        assert!(matches!(err, ExchangeError::MissingField("password")));
    }
}
