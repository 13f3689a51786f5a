//! Document store boundary.
//!
//! The store is an opaque key-value namespace addressed by path strings. It
//! offers single-document reads and writes only: no transactions spanning
//! documents and no uniqueness constraint beyond "one document per path".
//!
//! # Implementations
//!
//! - [`FirestoreStore`] - Cloud Firestore REST API
//! - [`MemoryStore`] - In-process map for tests and local development

mod firestore;
mod memory;

pub use firestore::FirestoreStore;
pub use memory::{MemoryStore, ScriptedFailure, StoreOp};

use async_trait::async_trait;
use thiserror::Error;

use neoays_core::{DocumentPath, Fields};

/// How a write combines with an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Replace the whole document.
    #[default]
    Replace,
    /// Overwrite only the given fields, keeping the rest.
    Merge,
}

/// Errors that can occur when talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Conditional create found an existing document.
    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// Security rules rejected the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store rejected the request.
    #[error("store rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status or store error code.
        status: u16,
        /// Error message from the store.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store endpoint is not a valid URL.
    #[error("invalid store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Whether the failure means the store is unreachable.
    ///
    /// Covers explicit unavailability, connection and timeout failures, and
    /// any error whose message reports the client as offline.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Http(e) if e.is_connect() || e.is_timeout() => true,
            other => other.to_string().to_lowercase().contains("offline"),
        }
    }
}

/// A document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Whether a document exists at `path`.
    async fn exists(&self, path: &DocumentPath) -> Result<bool, StoreError>;

    /// Read the document at `path`, if any.
    async fn read(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError>;

    /// Write `fields` to `path`. Last writer wins.
    async fn write(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Write `fields` to `path` only if no document exists there.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if a document is present.
    async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError>;
}
