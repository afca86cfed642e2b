//! Validation of third-party token exchanges.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ExchangeError, ExchangeForm, ExchangeRequest, required};
use crate::adapters::{AdapterError, OAuthAdapter};
use crate::models::auth::{SocialIdentity, User};
use crate::models::oauth::{Client, ClientFilter, ClientType};
use crate::scope::Scope;
use crate::social::{SocialError, StrategyRegistry};
use crate::store::UserStore;

/// Third-party identity whose access token the provider has accepted.
///
/// Only [`ExchangeValidator::verify`] produces one, so a request cannot reach
/// client resolution without a verified token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity(SocialIdentity);

impl VerifiedIdentity {
    pub fn identity(&self) -> &SocialIdentity {
        &self.0
    }
}

/// Validates an exchange form against one adapter.
pub struct ExchangeValidator {
    strategies: Arc<StrategyRegistry>,
    users: Arc<dyn UserStore>,
}

impl ExchangeValidator {
    pub fn new(strategies: Arc<StrategyRegistry>, users: Arc<dyn UserStore>) -> Self {
        Self { strategies, users }
    }

    /// Check the form in order and stop at the first failure: third-party
    /// token, client, scope, then the platform user behind the token.
    pub async fn validate(
        &self,
        social_backend: &str,
        form: &ExchangeForm,
        adapter: &dyn OAuthAdapter,
    ) -> Result<ExchangeRequest, ExchangeError> {
        let verified = self.verify(social_backend, form).await?;
        self.complete(verified, form, adapter).await
    }

    /// First step of [`ExchangeValidator::validate`]: require `access_token`
    /// and have the social provider accept it.
    pub async fn verify(
        &self,
        social_backend: &str,
        form: &ExchangeForm,
    ) -> Result<VerifiedIdentity, ExchangeError> {
        let access_token = required(&form.access_token, "access_token")?;
        let identity = self.verify_token(social_backend, access_token).await?;
        Ok(VerifiedIdentity(identity))
    }

    /// Remaining steps for a verified token: client, scope, then user.
    pub async fn complete(
        &self,
        verified: VerifiedIdentity,
        form: &ExchangeForm,
        adapter: &dyn OAuthAdapter,
    ) -> Result<ExchangeRequest, ExchangeError> {
        let client = resolve_client(adapter, &form.client_id).await?;
        let scope = resolve_scope(adapter, form.scope.as_deref())?;
        let user = self.resolve_user(verified.identity()).await?;

        debug!(
            backend = %adapter.backend(),
            client_id = %client.client_id,
            user_id = %user.id,
            scope = %scope,
            "exchange validated"
        );
        Ok(ExchangeRequest::new(user, scope, client))
    }

    async fn verify_token(
        &self,
        social_backend: &str,
        access_token: &str,
    ) -> Result<SocialIdentity, ExchangeError> {
        let strategy = self
            .strategies
            .get(social_backend)
            .map_err(|_| ExchangeError::UnknownBackend(social_backend.to_string()))?;

        strategy.user_data(access_token).await.map_err(|e| {
            warn!(provider = social_backend, error = %e, "third-party token rejected");
            match e {
                SocialError::InvalidToken(msg) => ExchangeError::InvalidThirdPartyToken(msg),
                SocialError::UnknownBackend(name) => ExchangeError::UnknownBackend(name),
                SocialError::Http(_) => ExchangeError::InvalidThirdPartyToken(format!(
                    "{social_backend} could not verify the access token"
                )),
            }
        })
    }

    async fn resolve_user(&self, identity: &SocialIdentity) -> Result<User, ExchangeError> {
        let user = self
            .users
            .find_by_social_uid(&identity.provider, &identity.uid)
            .await?
            .ok_or_else(|| {
                ExchangeError::UserResolution(format!(
                    "No user is linked to this {} account",
                    identity.provider
                ))
            })?;
        if !user.is_active {
            return Err(ExchangeError::UserResolution(
                "User account is disabled".to_string(),
            ));
        }
        Ok(user)
    }
}

/// Look up a public client owned by `adapter`.
pub(crate) async fn resolve_client(
    adapter: &dyn OAuthAdapter,
    client_id: &Option<String>,
) -> Result<Client, ExchangeError> {
    let client_id = required(client_id, "client_id")?;
    let client = match adapter.get_client(&ClientFilter::by_id(client_id)).await {
        Ok(client) => client,
        Err(AdapterError::ClientNotFound) => {
            return Err(ExchangeError::InvalidClient(format!(
                "'{client_id}' is not a valid client_id"
            )));
        }
        Err(e) => return Err(e.into()),
    };
    if client.client_type != ClientType::Public {
        return Err(ExchangeError::InvalidClient(format!(
            "'{client_id}' is not a public client"
        )));
    }
    Ok(client)
}

/// Parse a space separated scope against the adapter's accepted names.
pub(crate) fn resolve_scope(
    adapter: &dyn OAuthAdapter,
    raw: Option<&str>,
) -> Result<Scope, ExchangeError> {
    let Some(raw) = raw else {
        return Ok(Scope::empty());
    };
    let supported = adapter.supported_scopes();
    if let Some(name) = raw.split_whitespace().find(|n| !supported.contains(*n)) {
        return Err(ExchangeError::InvalidScope(format!(
            "'{name}' is not a supported scope"
        )));
    }
    Scope::from_names(raw.split_whitespace()).map_err(|name| {
        ExchangeError::InvalidScope(format!("'{name}' is not a supported scope"))
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::adapters::{LegacyAdapter, ModernAdapter};
    use crate::models::auth::SocialLink;
    use crate::models::oauth::{Backend, TokenLifetimes};
    use crate::social::SocialStrategy;
    use crate::store::MemoryStore;

    /// Accepts any token of the form `valid:<uid>`.
    struct FakeProvider;

    #[async_trait]
    impl SocialStrategy for FakeProvider {
        fn name(&self) -> &str {
            "google-oauth2"
        }

        async fn user_data(&self, access_token: &str) -> Result<SocialIdentity, SocialError> {
            let uid = access_token
                .strip_prefix("valid:")
                .ok_or_else(|| SocialError::InvalidToken("token rejected".into()))?;
            Ok(SocialIdentity {
                provider: "google-oauth2".into(),
                uid: uid.into(),
                email: None,
            })
        }
    }

    fn user(id: &str, is_active: bool) -> User {
        User {
            id: id.into(),
            username: id.into(),
            email: format!("{id}@example.test"),
            is_active,
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        validator: ExchangeValidator,
        legacy: LegacyAdapter,
        modern: ModernAdapter,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        store.add_user(user("ada", true), None);
        store.add_user(user("bob", false), None);
        for (uid, user_id) in [("g-ada", "ada"), ("g-bob", "bob")] {
            store.link_social(SocialLink {
                provider: "google-oauth2".into(),
                uid: uid.into(),
                user_id: user_id.into(),
            });
        }

        let legacy = LegacyAdapter::new(store.clone(), TokenLifetimes::default());
        let modern = ModernAdapter::new(store.clone(), TokenLifetimes::default());
        let owner = user("ada", true);
        legacy
            .create_public_client("dop", &owner, Some("dop-public"), "https://example.test")
            .await
            .unwrap();
        legacy
            .create_confidential_client(&owner, Some("dop-secret"))
            .await
            .unwrap();
        modern
            .create_public_client("dot", &owner, Some("dot-public"), "https://example.test")
            .await
            .unwrap();

        let strategies = Arc::new(StrategyRegistry::new().with(Arc::new(FakeProvider)));
        Fixture {
            validator: ExchangeValidator::new(strategies, store.clone()),
            store,
            legacy,
            modern,
        }
    }

    fn form(access_token: &str, client_id: &str, scope: Option<&str>) -> ExchangeForm {
        ExchangeForm {
            access_token: Some(access_token.into()),
            client_id: Some(client_id.into()),
            scope: scope.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn valid_exchange_resolves_user_client_and_scope() {
        let f = fixture().await;
        let request = f
            .validator
            .validate("google-oauth2", &form("valid:g-ada", "dop-public", Some("profile email")), &f.legacy)
            .await
            .unwrap();
        assert_eq!(request.user().id, "ada");
        assert_eq!(request.client().client_id, "dop-public");
        assert_eq!(request.scope().names(), &["profile", "email"]);
    }

    #[tokio::test]
    async fn missing_scope_is_empty() {
        let f = fixture().await;
        let request = f
            .validator
            .validate("google-oauth2", &form("valid:g-ada", "dot-public", None), &f.modern)
            .await
            .unwrap();
        assert!(request.scope().is_empty());
    }

    #[tokio::test]
    async fn verified_identity_completes_against_either_adapter() {
        let f = fixture().await;
        let verified = f
            .validator
            .verify("google-oauth2", &form("valid:g-ada", "dot-public", None))
            .await
            .unwrap();
        assert_eq!(verified.identity().uid, "g-ada");

        let request = f
            .validator
            .complete(verified.clone(), &form("valid:g-ada", "dot-public", None), &f.modern)
            .await
            .unwrap();
        assert_eq!(request.client().backend, Backend::Modern);

        let err = f
            .validator
            .complete(verified, &form("valid:g-ada", "dot-public", None), &f.legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidClient(_)));
    }

    #[tokio::test]
    async fn verify_rejects_before_any_client_is_named() {
        let f = fixture().await;
        let err = f
            .validator
            .verify("google-oauth2", &form("expired", "dot-public", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidThirdPartyToken(_)));
    }

    #[tokio::test]
    async fn invalid_token_fails_before_client_lookup() {
        let f = fixture().await;
        let err = f
            .validator
            .validate("google-oauth2", &form("expired", "no-such-client", None), &f.legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidThirdPartyToken(_)));
        assert_eq!(err.field(), Some("access_token"));
    }

    #[tokio::test]
    async fn unknown_social_backend() {
        let f = fixture().await;
        let err = f
            .validator
            .validate("myspace", &form("valid:g-ada", "dop-public", None), &f.legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownBackend(name) if name == "myspace"));
    }

    #[tokio::test]
    async fn clients_are_checked_per_backend_and_must_be_public() {
        let f = fixture().await;
        let err = f
            .validator
            .validate("google-oauth2", &form("valid:g-ada", "dot-public", None), &f.legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidClient(_)));

        let err = f
            .validator
            .validate("google-oauth2", &form("valid:g-ada", "dop-secret", None), &f.legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidClient(msg) if msg.contains("public")));

        let missing = ExchangeForm {
            access_token: Some("valid:g-ada".into()),
            ..ExchangeForm::default()
        };
        let err = f
            .validator
            .validate("google-oauth2", &missing, &f.legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::MissingField("client_id")));
    }

    #[tokio::test]
    async fn scopes_are_limited_to_the_backend() {
        let f = fixture().await;
        let err = f
            .validator
            .validate("google-oauth2", &form("valid:g-ada", "dot-public", Some("course_staff")), &f.modern)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidScope(_)));

        f.validator
            .validate("google-oauth2", &form("valid:g-ada", "dop-public", Some("course_staff")), &f.legacy)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unlinked_and_inactive_users_are_rejected() {
        let f = fixture().await;
        for token in ["valid:g-nobody", "valid:g-bob"] {
            let err = f
                .validator
                .validate("google-oauth2", &form(token, "dop-public", None), &f.legacy)
                .await
                .unwrap_err();
            assert!(matches!(err, ExchangeError::UserResolution(_)));
        }
        assert_eq!(f.store.token_count().await, 0);
    }
}
