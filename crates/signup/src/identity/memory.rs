//! In-process identity provider.
//!
//! Enforces unique emails and a minimum password length the way the hosted
//! provider does. Ids are random unless queued with
//! [`MemoryIdentityProvider::queue_id`], and failures can be scripted by
//! provider error code.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use neoays_core::{Email, Identity, IdentityId};

use super::{IdentityEvents, IdentityProvider, IdentitySubscription, ProviderError};

/// Shortest password the provider accepts.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Identity provider backed by in-memory maps.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<BTreeMap<String, IdentityId>>,
    tokens: Mutex<HashMap<String, Identity>>,
    queued_ids: Mutex<VecDeque<IdentityId>>,
    next_create_error: Mutex<Option<String>>,
    offline: AtomicBool,
    create_calls: AtomicUsize,
    events: IdentityEvents,
}

impl MemoryIdentityProvider {
    /// Create a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `id` for the next identity issued, in queue order.
    pub async fn queue_id(&self, id: IdentityId) {
        self.queued_ids.lock().await.push_back(id);
    }

    /// Accept `token` for [`IdentityProvider::sign_in_with_token`], signing in as `identity`.
    pub async fn register_token(&self, token: impl Into<String>, identity: Identity) {
        self.tokens.lock().await.insert(token.into(), identity);
    }

    /// Fail the next `create_account` with a provider error code, e.g. `EMAIL_EXISTS`.
    pub async fn fail_next_create(&self, code: impl Into<String>) {
        *self.next_create_error.lock().await = Some(code.into());
    }

    /// Make every call fail as unreachable until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `create_account` calls received.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Id registered for `email`, if an account exists.
    pub async fn account_id(&self, email: &Email) -> Option<IdentityId> {
        self.accounts.lock().await.get(email.as_str()).cloned()
    }

    fn ensure_online(&self) -> Result<(), ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("client is offline".to_string()));
        }
        Ok(())
    }

    async fn next_id(&self) -> Result<IdentityId, ProviderError> {
        if let Some(id) = self.queued_ids.lock().await.pop_front() {
            return Ok(id);
        }
        IdentityId::parse(&uuid::Uuid::new_v4().simple().to_string())
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError> {
        self.ensure_online()?;
        let identity = Identity::anonymous(self.next_id().await?);
        self.events.publish(&identity);
        Ok(identity)
    }

    async fn sign_in_with_token(&self, token: &SecretString) -> Result<Identity, ProviderError> {
        self.ensure_online()?;
        let identity = self
            .tokens
            .lock()
            .await
            .get(token.expose_secret())
            .cloned()
            .ok_or_else(|| ProviderError::from_code("INVALID_CUSTOM_TOKEN"))?;
        self.events.publish(&identity);
        Ok(identity)
    }

    async fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        if let Some(code) = self.next_create_error.lock().await.take() {
            return Err(ProviderError::from_code(&code));
        }

        if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProviderError::from_code(
                "WEAK_PASSWORD : Password should be at least 6 characters",
            ));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email.as_str()) {
            return Err(ProviderError::EmailInUse);
        }

        let identity = Identity::persistent(self.next_id().await?, email.clone());
        accounts.insert(email.as_str().to_string(), identity.id.clone());
        drop(accounts);

        self.events.publish(&identity);
        Ok(identity)
    }

    fn on_identity_changed(&self) -> IdentitySubscription {
        self.events.subscribe()
    }
}
