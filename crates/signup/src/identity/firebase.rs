//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! # API Reference
//!
//! - Base URL: `https://identitytoolkit.googleapis.com/v1`
//! - Authentication: web API key via `?key=`
//! - `accounts:signUp` - anonymous sign-in (no body fields) or email/password account creation
//! - `accounts:signInWithCustomToken` - exchange a custom token for an ID token
//! - `accounts:lookup` - resolve an ID token to its account
//!
//! Errors come back as `{"error": {"message": "EMAIL_EXISTS", ...}}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use neoays_core::{Email, Identity, IdentityId};

use super::{IdentityEvents, IdentityProvider, IdentitySubscription, ProviderError};
use crate::config::FirebaseConfig;

/// Identity Toolkit API base URL.
const BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Firebase Authentication client.
#[derive(Clone)]
pub struct FirebaseAuth {
    inner: Arc<FirebaseAuthInner>,
}

struct FirebaseAuthInner {
    client: reqwest::Client,
    api_key: SecretString,
    events: IdentityEvents,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseAuth {
    /// Create a client for the project in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(FirebaseAuthInner {
                client,
                api_key: config.api_key.clone(),
                events: IdentityEvents::new(),
            }),
        })
    }

    /// POST `body` to an `accounts:*` method and decode the response.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, ProviderError> {
        let url = format!("{BASE_URL}/accounts:{method}");
        let response = self
            .inner
            .client
            .post(&url)
            .query(&[("key", self.inner.api_key.expose_secret())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ProviderError::Decode(format!("Failed to parse {method} response: {e}")));
        }

        let text = response.text().await.unwrap_or_default();
        tracing::debug!(method, status = status.as_u16(), "Identity Toolkit error");
        Err(classify_error(status.as_u16(), &text))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError> {
        let response: SignUpResponse = self
            .call("signUp", &json!({ "returnSecureToken": true }))
            .await?;
        let identity = Identity::anonymous(parse_id(&response.local_id)?);
        self.inner.events.publish(&identity);
        Ok(identity)
    }

    async fn sign_in_with_token(&self, token: &SecretString) -> Result<Identity, ProviderError> {
        let tokens: TokenResponse = self
            .call(
                "signInWithCustomToken",
                &json!({ "token": token.expose_secret(), "returnSecureToken": true }),
            )
            .await?;

        let lookup: LookupResponse = self
            .call("lookup", &json!({ "idToken": tokens.id_token }))
            .await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("lookup returned no users".to_string()))?;

        let identity = to_identity(&user.local_id, user.email.as_deref())?;
        self.inner.events.publish(&identity);
        Ok(identity)
    }

    async fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, ProviderError> {
        let response: SignUpResponse = self
            .call(
                "signUp",
                &json!({
                    "email": email.as_str(),
                    "password": password.expose_secret(),
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let identity = match response.email.as_deref() {
            Some(returned) => to_identity(&response.local_id, Some(returned))?,
            None => Identity::persistent(parse_id(&response.local_id)?, email.clone()),
        };
        self.inner.events.publish(&identity);
        Ok(identity)
    }

    fn on_identity_changed(&self) -> IdentitySubscription {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for FirebaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuth").finish_non_exhaustive()
    }
}

fn parse_id(local_id: &str) -> Result<IdentityId, ProviderError> {
    IdentityId::parse(local_id).map_err(|e| ProviderError::Decode(format!("bad localId: {e}")))
}

/// Accounts without an email are anonymous.
fn to_identity(local_id: &str, email: Option<&str>) -> Result<Identity, ProviderError> {
    let id = parse_id(local_id)?;
    match email {
        Some(email) => {
            let email =
                Email::parse(email).map_err(|e| ProviderError::Decode(format!("bad email: {e}")))?;
            Ok(Identity::persistent(id, email))
        }
        None => Ok(Identity::anonymous(id)),
    }
}

/// Map a failed Identity Toolkit response onto a provider error.
fn classify_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ProviderError::from_code(&envelope.error.message),
        Err(_) if status == 503 => ProviderError::Unavailable(body.to_string()),
        Err(_) => ProviderError::Rejected(format!("{status}: {body}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_email_exists() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[{"message":"EMAIL_EXISTS","domain":"global","reason":"invalid"}]}}"#;
        assert!(matches!(classify_error(400, body), ProviderError::EmailInUse));
    }

    #[test]
    fn test_classify_weak_password() {
        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        assert!(matches!(
            classify_error(400, body),
            ProviderError::WeakPassword(d) if d.contains("6 characters")
        ));
    }

    #[test]
    fn test_classify_non_json_body() {
        assert!(classify_error(503, "Service Unavailable").is_offline());
        assert!(matches!(
            classify_error(502, "<html>"),
            ProviderError::Rejected(_)
        ));
    }

    #[test]
    fn test_to_identity() {
        let anon = to_identity("abc", None).unwrap();
        assert!(anon.is_anonymous);

        let user = to_identity("u9", Some("a@b.com")).unwrap();
        assert!(!user.is_anonymous);
        assert_eq!(user.email.unwrap().as_str(), "a@b.com");

        assert!(to_identity("", None).is_err());
    }

    #[test]
    fn test_sign_up_response_shape() {
        let body = r#"{"kind":"identitytoolkit#SignupNewUserResponse","idToken":"t","refreshToken":"r","expiresIn":"3600","localId":"u9","email":"a@b.com"}"#;
        let response: SignUpResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.local_id, "u9");
        assert_eq!(response.email.as_deref(), Some("a@b.com"));
    }
}
