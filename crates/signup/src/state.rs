//! Application state shared across handlers.

use std::sync::Arc;

use neoays_core::DocumentPaths;

use crate::config::{BackendKind, SignupConfig};
use crate::identity::{
    FirebaseAuth, IdentityProvider, IdentitySubscription, MemoryIdentityProvider, ProviderError,
};
use crate::services::reservation::ReservationWorkflow;
use crate::store::{DocumentStore, FirestoreStore, MemoryStore, StoreError};

/// Error building the backends named by the configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("firebase backend selected without firebase configuration")]
    MissingFirebaseConfig,
    #[error("document store: {0}")]
    Store(#[from] StoreError),
    #[error("identity provider: {0}")]
    Provider(#[from] ProviderError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and holds the configuration
/// and the two backends the reservation workflow runs against.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SignupConfig,
    paths: DocumentPaths,
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Create the application state with the backends `config` selects.
    ///
    /// # Errors
    ///
    /// Returns an error if the Firebase clients cannot be built.
    pub fn new(config: SignupConfig) -> Result<Self, StateError> {
        let (store, provider): (Arc<dyn DocumentStore>, Arc<dyn IdentityProvider>) =
            match config.backend() {
                BackendKind::Firebase => {
                    let firebase = config
                        .firebase
                        .as_ref()
                        .ok_or(StateError::MissingFirebaseConfig)?;
                    (
                        Arc::new(FirestoreStore::new(firebase)?),
                        Arc::new(FirebaseAuth::new(firebase)?),
                    )
                }
                BackendKind::Memory => (
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryIdentityProvider::new()),
                ),
            };

        Ok(Self::with_backends(config, store, provider))
    }

    /// Create the application state over explicit backends.
    #[must_use]
    pub fn with_backends(
        config: SignupConfig,
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let paths = config.documents.paths();
        Self {
            inner: Arc::new(AppStateInner {
                config,
                paths,
                store,
                provider,
            }),
        }
    }

    /// Get a reference to the signup configuration.
    #[must_use]
    pub fn config(&self) -> &SignupConfig {
        &self.inner.config
    }

    /// Get the document path layout.
    #[must_use]
    pub fn paths(&self) -> &DocumentPaths {
        &self.inner.paths
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the identity provider.
    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.inner.provider.as_ref()
    }

    /// Subscribe to identity changes from the provider.
    #[must_use]
    pub fn identity_changes(&self) -> IdentitySubscription {
        self.inner.provider.on_identity_changed()
    }

    /// Reservation workflow over this state's backends.
    #[must_use]
    pub fn workflow(&self) -> ReservationWorkflow<'_> {
        ReservationWorkflow::new(
            self.store(),
            self.provider(),
            self.paths(),
            self.inner.config.reserve_policy,
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("paths", &self.inner.paths)
            .finish_non_exhaustive()
    }
}
