//! Identity provider boundary.
//!
//! The provider issues an anonymous identity on first visit, or a persistent
//! identity once the visitor creates an account with email and password.
//! Every identity it issues is also published to subscribers of
//! [`IdentityProvider::on_identity_changed`].
//!
//! # Implementations
//!
//! - [`FirebaseAuth`] - Firebase Identity Toolkit REST API
//! - [`MemoryIdentityProvider`] - In-process fake for tests and local development

mod firebase;
mod memory;

pub use firebase::FirebaseAuth;
pub use memory::MemoryIdentityProvider;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::broadcast;

use neoays_core::{Email, Identity};

/// Buffered identity changes per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// Errors returned by the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An account with this email already exists.
    #[error("email already in use")]
    EmailInUse,

    /// The provider rejected the password.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// The provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request.
    #[error("identity provider rejected request: {0}")]
    Rejected(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Classify a provider error code such as `EMAIL_EXISTS` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let (head, detail) = code
            .split_once(" : ")
            .map_or((code, None), |(head, detail)| (head, Some(detail)));

        match head.trim() {
            "EMAIL_EXISTS" => Self::EmailInUse,
            "WEAK_PASSWORD" => Self::WeakPassword(detail.unwrap_or(head).to_string()),
            h if h.contains("UNAVAILABLE") => Self::Unavailable(code.to_string()),
            _ => Self::Rejected(code.to_string()),
        }
    }

    /// Whether the failure means the provider is unreachable.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            other => other.to_string().to_lowercase().contains("offline"),
        }
    }
}

/// An identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Issue a fresh anonymous identity.
    async fn sign_in_anonymously(&self) -> Result<Identity, ProviderError>;

    /// Sign in with a custom token issued by the hosting environment.
    async fn sign_in_with_token(&self, token: &SecretString) -> Result<Identity, ProviderError>;

    /// Create a persistent account. The new identity has a new id, even when
    /// the caller was signed in anonymously.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::EmailInUse` or `ProviderError::WeakPassword`
    /// for the rejections the form reports specifically.
    async fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, ProviderError>;

    /// Subscribe to identity changes. Dropping the subscription unsubscribes.
    fn on_identity_changed(&self) -> IdentitySubscription;
}

/// Fan-out of identity changes to subscribers.
#[derive(Debug, Clone)]
pub struct IdentityEvents {
    sender: broadcast::Sender<Identity>,
}

impl IdentityEvents {
    /// Create a channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an identity change. A no-op when nobody is subscribed.
    pub fn publish(&self, identity: &Identity) {
        let _ = self.sender.send(identity.clone());
    }

    /// Subscribe to changes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for IdentityEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to identity changes.
#[derive(Debug)]
pub struct IdentitySubscription {
    receiver: broadcast::Receiver<Identity>,
}

impl IdentitySubscription {
    /// Wait for the next identity change.
    ///
    /// Returns `None` once the provider is gone. A subscriber that falls
    /// behind skips the changes it missed.
    pub async fn next(&mut self) -> Option<Identity> {
        loop {
            match self.receiver.recv().await {
                Ok(identity) => return Some(identity),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Identity subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
