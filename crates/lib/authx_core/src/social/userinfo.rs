//! Strategies that verify a token by calling the provider's user info endpoint.

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;
use url::Url;

use super::{SocialError, SocialStrategy};
use crate::models::auth::SocialIdentity;

const GOOGLE_USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const FACEBOOK_USERINFO_ENDPOINT: &str = "https://graph.facebook.com/me?fields=id,name,email";
const GITHUB_USERINFO_ENDPOINT: &str = "https://api.github.com/user";

/// Bearer-authenticated GET against a user info endpoint; the account id is
/// read from `uid_field` of the JSON reply.
#[derive(Clone)]
pub struct UserInfoStrategy {
    name: String,
    endpoint: Url,
    uid_field: String,
    http_client: Client,
}

impl UserInfoStrategy {
    pub fn new(name: &str, endpoint: Url, uid_field: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint,
            uid_field: uid_field.to_string(),
            http_client: Client::new(),
        }
    }

    /// Built-in strategy for a known backend name.
    pub fn builtin(name: &str) -> Option<Self> {
        let (endpoint, uid_field) = match name {
            "google-oauth2" => (GOOGLE_USERINFO_ENDPOINT, "sub"),
            "facebook" => (FACEBOOK_USERINFO_ENDPOINT, "id"),
            "github" => (GITHUB_USERINFO_ENDPOINT, "id"),
            _ => return None,
        };
        let endpoint = Url::parse(endpoint).ok()?;
        Some(Self::new(name, endpoint, uid_field))
    }
}

#[async_trait]
impl SocialStrategy for UserInfoStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn user_data(&self, access_token: &str) -> Result<SocialIdentity, SocialError> {
        let response = self
            .http_client
            .get(self.endpoint.clone())
            .header("Accept", "application/json")
            .header("User-Agent", "authx")
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = %self.name, status = %status, "user info request rejected");
            return Err(SocialError::InvalidToken(format!(
                "{} rejected the access token ({})",
                self.name,
                status.as_u16()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let uid = match body.get(&self.uid_field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(SocialError::InvalidToken(format!(
                    "{} returned no '{}' for the access token",
                    self.name, self.uid_field
                )));
            }
        };

        Ok(SocialIdentity {
            provider: self.name.clone(),
            uid,
            email: body
                .get("email")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
