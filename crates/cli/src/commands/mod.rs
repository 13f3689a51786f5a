//! CLI command implementations.
//!
//! Commands run against any [`DocumentStore`]; [`connect`] builds the
//! Firestore store from the same environment variables the server reads.

pub mod profile;
pub mod username;

use neoays_core::{DocumentPaths, IdError, RecordError, UsernameError};
use neoays_signup::config::{ConfigError, SignupConfig};
use neoays_signup::store::{DocumentStore, FirestoreStore, StoreError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The commands need the Firestore backend.
    #[error("Firebase is not configured (NEOAYS_BACKEND=memory has no stored records)")]
    MissingFirebase,

    /// Invalid username argument.
    #[error("Invalid username: {0}")]
    Username(#[from] UsernameError),

    /// Invalid identity id argument.
    #[error("Invalid identity id: {0}")]
    Id(#[from] IdError),

    /// Invalid profile field argument.
    #[error("Invalid {field}: {message}")]
    Field {
        /// Argument name.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// Stored document does not match its record shape.
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Document store call failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The document does not exist.
    #[error("No document at {0}")]
    NotFound(String),
}

/// Load configuration and connect to Firestore.
///
/// # Errors
///
/// Returns an error if configuration is missing or the client cannot be built.
pub fn connect() -> Result<(FirestoreStore, DocumentPaths), CommandError> {
    let config = SignupConfig::from_env()?;
    let firebase = config
        .firebase
        .as_ref()
        .ok_or(CommandError::MissingFirebase)?;

    tracing::info!(project_id = %firebase.project_id, "Connecting to Firestore");
    Ok((FirestoreStore::new(firebase)?, config.documents.paths()))
}

/// Pretty-print a record as JSON.
pub(crate) fn render(fields: &neoays_core::Fields) -> String {
    serde_json::to_string_pretty(fields).unwrap_or_else(|_| format!("{fields:?}"))
}

/// Store and path layout a command runs against.
pub struct Target<'a> {
    pub store: &'a dyn DocumentStore,
    pub paths: &'a DocumentPaths,
}
