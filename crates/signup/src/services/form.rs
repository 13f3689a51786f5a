//! Signup form controller.
//!
//! Drives the pure form state machine for one visitor session:
//!
//! 1. Load the [`FormState`] from the session
//! 2. Apply the request event and persist the in-flight state
//! 3. Run the workflow call on a spawned task
//! 4. Apply the completion or failure event and persist the result
//!
//! The in-flight state saved in step 2 is the session's only concurrency
//! guard: a second request that loads it is rejected with
//! [`TransitionError::Busy`]. Steps 3 and 4 run on their own task, so a
//! dropped request still settles the session. Workflow errors never escape;
//! they become the form's error message.

use std::future::Future;

use thiserror::Error;
use tower_sessions::Session;
use tracing::Instrument;

use neoays_core::{Event, FormState, Identity, TransitionError, transition};

use crate::models::session::keys;
use crate::services::reservation::{SignupForm, WorkflowError};
use crate::state::AppState;

/// Errors that can occur while driving the form.
#[derive(Debug, Error)]
pub enum FormError {
    /// Session storage failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The request does not apply to the form's current state.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The workflow task panicked or was aborted.
    #[error("workflow task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Signup form controller for one session.
pub struct FormController {
    session: Session,
    state: AppState,
}

impl FormController {
    /// Create a controller over `session`.
    #[must_use]
    pub const fn new(session: Session, state: AppState) -> Self {
        Self { session, state }
    }

    /// Current form state, or the initial state for a new session.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Session` if the session cannot be read.
    pub async fn state(&self) -> Result<FormState, FormError> {
        Ok(self
            .session
            .get::<FormState>(keys::FORM_STATE)
            .await?
            .unwrap_or_default())
    }

    /// Identity issued to this visitor, if any.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Session` if the session cannot be read.
    pub async fn identity(&self) -> Result<Option<Identity>, FormError> {
        Ok(self.session.get::<Identity>(keys::IDENTITY).await?)
    }

    /// Remember the identity issued to this visitor.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Session` if the session cannot be written.
    pub async fn set_identity(&self, identity: &Identity) -> Result<(), FormError> {
        Ok(self.session.insert(keys::IDENTITY, identity).await?)
    }

    /// Replace the username input. Returns the form to idle.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Transition` if the username is not editable now.
    pub async fn edit_username(&self, input: &str) -> Result<FormState, FormError> {
        let state = self.state().await?;
        self.apply(&state, Event::UsernameEdited(input.to_string()))
            .await
    }

    /// Take `input` as the username and check its availability.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Transition` if a request is in flight or the
    /// username is not editable now.
    pub async fn check(&self, input: &str) -> Result<FormState, FormError> {
        let state = self.state().await?;
        let edited = transition(&state, Event::UsernameEdited(input.to_string()))?;

        let checking = match transition(&edited, Event::CheckRequested) {
            Ok(next) => next,
            Err(TransitionError::Username(e)) => {
                let message = WorkflowError::invalid_username(&e).user_message();
                return self.apply(&edited, Event::ValidationFailed(message)).await;
            }
            Err(e) => return Err(e.into()),
        };
        persist(&self.session, &checking).await?;

        let (session, app) = (self.session.clone(), self.state.clone());
        run_to_completion(async move {
            let event = match app.workflow().check_availability(&checking.username).await {
                Ok(availability) => Event::CheckCompleted(availability),
                Err(e) => Event::CheckFailed(e.user_message()),
            };
            settle(&session, &checking, event).await
        })
        .await
    }

    /// Reserve the checked username for this visitor.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Transition` unless the username was just found available.
    pub async fn reserve(&self) -> Result<FormState, FormError> {
        let state = self.state().await?;
        let identity = self.identity().await?;

        let reserving = transition(&state, Event::ReserveRequested)?;
        persist(&self.session, &reserving).await?;

        let (session, app) = (self.session.clone(), self.state.clone());
        run_to_completion(async move {
            let event = match app
                .workflow()
                .reserve(&reserving.username, identity.as_ref())
                .await
            {
                Ok(()) => Event::ReserveCompleted,
                Err(e) => Event::ReserveFailed(e.user_message()),
            };
            settle(&session, &reserving, event).await
        })
        .await
    }

    /// Create the account for the reserved username.
    ///
    /// The entered email, mobile number and privacy choice are kept in the
    /// form state; the password is not.
    ///
    /// # Errors
    ///
    /// Returns `FormError::Transition` unless a username is reserved.
    pub async fn finalize(&self, form: &SignupForm) -> Result<FormState, FormError> {
        let state = self.state().await?;
        let identity = self.identity().await?;

        let edited = transition(
            &state,
            Event::ProfileEdited {
                email: form.email.clone(),
                mobile_number: form.mobile_number.clone(),
            },
        )?;
        let edited = transition(&edited, Event::PrivacyToggled(form.privacy_accepted))?;

        if let Err(e) = form.validate(&edited.username) {
            return self
                .apply(&edited, Event::ValidationFailed(e.user_message()))
                .await;
        }

        let finalizing = transition(&edited, Event::FinalizeRequested)?;
        persist(&self.session, &finalizing).await?;

        let (session, app, form) = (self.session.clone(), self.state.clone(), form.clone());
        run_to_completion(async move {
            match app
                .workflow()
                .finalize(&finalizing.username, identity.as_ref(), &form)
                .await
            {
                Ok(account) => {
                    let done = transition(&finalizing, Event::FinalizeCompleted)?;
                    session.insert(keys::IDENTITY, &account).await?;
                    persist(&session, &done).await?;
                    Ok(done)
                }
                Err(e) => {
                    let event = Event::FinalizeFailed(e.user_message());
                    settle(&session, &finalizing, event).await
                }
            }
        })
        .await
    }

    async fn apply(&self, state: &FormState, event: Event) -> Result<FormState, FormError> {
        let next = transition(state, event)?;
        self.session.insert(keys::FORM_STATE, &next).await?;
        Ok(next)
    }
}

/// Run `task` to completion on its own task, even if the caller is dropped.
async fn run_to_completion<F>(task: F) -> Result<FormState, FormError>
where
    F: Future<Output = Result<FormState, FormError>> + Send + 'static,
{
    tokio::spawn(task.in_current_span()).await?
}

/// Apply the completion `event` to the in-flight `state` and persist it.
async fn settle(session: &Session, state: &FormState, event: Event) -> Result<FormState, FormError> {
    let next = transition(state, event)?;
    persist(session, &next).await?;
    Ok(next)
}

/// Store and save immediately, so concurrent requests see the state even
/// when no response is ever sent.
async fn persist(session: &Session, state: &FormState) -> Result<(), FormError> {
    session.insert(keys::FORM_STATE, state).await?;
    Ok(session.save().await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::SecretString;
    use tokio::sync::Semaphore;
    use tower_sessions::MemoryStore as SessionStore;

    use neoays_core::{Availability, DocumentPath, Fields, IdentityId, Phase};

    use super::*;
    use crate::config::SignupConfig;
    use crate::identity::MemoryIdentityProvider;
    use crate::store::{DocumentStore, MemoryStore, ScriptedFailure, StoreError, StoreOp, WriteMode};

    struct Harness {
        sessions: Arc<SessionStore>,
        session: Session,
        store: Arc<MemoryStore>,
        provider: Arc<MemoryIdentityProvider>,
        app: AppState,
    }

    impl Harness {
        fn new() -> Self {
            let sessions = Arc::new(SessionStore::default());
            let store = Arc::new(MemoryStore::new());
            let provider = Arc::new(MemoryIdentityProvider::new());
            Self {
                session: Session::new(None, sessions.clone(), None),
                app: AppState::with_backends(SignupConfig::memory(), store.clone(), provider.clone()),
                sessions,
                store,
                provider,
            }
        }

        fn controller(&self) -> FormController {
            FormController::new(self.session.clone(), self.app.clone())
        }

        /// Controller over a fresh handle to the same stored session.
        fn reload(&self) -> FormController {
            let id = self.session.id().unwrap();
            FormController::new(Session::new(Some(id), self.sessions.clone(), None), self.app.clone())
        }

        async fn sign_in(&self, id: &str) {
            let identity = Identity::anonymous(IdentityId::parse(id).unwrap());
            self.controller().set_identity(&identity).await.unwrap();
        }
    }

    /// Store whose existence checks wait until a permit is released.
    struct GatedStore {
        inner: MemoryStore,
        gate: Semaphore,
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn exists(&self, path: &DocumentPath) -> Result<bool, StoreError> {
            self.gate
                .acquire()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?
                .forget();
            self.inner.exists(path).await
        }

        async fn read(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError> {
            self.inner.read(path).await
        }

        async fn write(
            &self,
            path: &DocumentPath,
            fields: Fields,
            mode: WriteMode,
        ) -> Result<(), StoreError> {
            self.inner.write(path, fields, mode).await
        }

        async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
            self.inner.create(path, fields).await
        }
    }

    fn signup(email: &str, password: &str, mobile: &str, privacy: bool) -> SignupForm {
        SignupForm {
            email: email.to_string(),
            password: SecretString::from(password),
            mobile_number: mobile.to_string(),
            privacy_accepted: privacy,
        }
    }

    #[tokio::test]
    async fn test_new_session_starts_idle() {
        let h = Harness::new();
        assert_eq!(h.controller().state().await.unwrap(), FormState::default());
        assert_eq!(h.controller().identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_full_signup_flow() {
        let h = Harness::new();
        h.sign_in("anon1").await;
        h.provider.queue_id(IdentityId::parse("u9").unwrap()).await;
        let controller = h.controller();

        let state = controller.check("Alice").await.unwrap();
        assert_eq!(state.phase, Phase::Available);
        assert_eq!(state.username, "alice");

        let state = controller.reserve().await.unwrap();
        assert!(state.is_reserved());

        let state = controller
            .finalize(&signup("a@b.com", "pw123456", "555-0100", true))
            .await
            .unwrap();
        assert!(state.is_signed_up());
        assert!(!state.is_reserved());
        assert_eq!(state.error, None);

        let identity = controller.identity().await.unwrap().unwrap();
        assert_eq!(identity.id.as_str(), "u9");
        assert!(!identity.is_anonymous);
    }

    #[tokio::test]
    async fn test_short_username_sets_message_without_store_call() {
        let h = Harness::new();
        let state = h.controller().check("ab").await.unwrap();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.availability, Availability::Unknown);
        assert_eq!(
            state.error.as_deref(),
            Some("Username must be at least 3 characters long.")
        );
        assert_eq!(h.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_check_fails_closed() {
        let h = Harness::new();
        h.store.fail(ScriptedFailure::offline(StoreOp::Read, "/"));
        let state = h.controller().check("alice").await.unwrap();
        assert_eq!(state.phase, Phase::CheckError);
        assert_eq!(state.availability, Availability::Taken);
        assert_eq!(
            state.error.as_deref(),
            Some("Cannot check username while offline. Please check your internet connection.")
        );
        assert_eq!(state.username, "alice");
    }

    #[tokio::test]
    async fn test_in_flight_state_rejects_requests() {
        let h = Harness::new();
        let checking = FormState {
            phase: Phase::Checking,
            username: "alice".into(),
            ..FormState::default()
        };
        h.session.insert(keys::FORM_STATE, &checking).await.unwrap();

        let err = h.controller().check("alice").await.unwrap_err();
        assert!(matches!(err, FormError::Transition(TransitionError::Busy)));
        let err = h.controller().reserve().await.unwrap_err();
        assert!(matches!(err, FormError::Transition(TransitionError::Busy)));
        assert_eq!(h.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_reserve_without_identity_returns_to_available() {
        let h = Harness::new();
        let controller = h.controller();
        controller.check("alice").await.unwrap();

        let state = controller.reserve().await.unwrap();
        assert_eq!(state.phase, Phase::Available);
        assert_eq!(
            state.error.as_deref(),
            Some("You must be signed in to reserve a username.")
        );
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reserve_requires_available_name() {
        let h = Harness::new();
        h.sign_in("anon1").await;
        let err = h.controller().reserve().await.unwrap_err();
        assert!(matches!(
            err,
            FormError::Transition(TransitionError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_finalize_validation_keeps_input() {
        let h = Harness::new();
        h.sign_in("anon1").await;
        let controller = h.controller();
        controller.check("alice").await.unwrap();
        controller.reserve().await.unwrap();

        let state = controller
            .finalize(&signup("", "pw123456", "555-0100", true))
            .await
            .unwrap();
        assert_eq!(state.phase, Phase::Reserved);
        assert_eq!(state.error.as_deref(), Some("All fields are required."));
        assert_eq!(state.mobile_number, "555-0100");
        assert_eq!(h.provider.create_calls(), 0);

        let state = controller
            .finalize(&signup("a@b.com", "pw123456", "555-0100", false))
            .await
            .unwrap();
        assert_eq!(
            state.error.as_deref(),
            Some("You must accept the privacy policy to continue.")
        );
        assert_eq!(state.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_finalize_failure_allows_retry() {
        let h = Harness::new();
        h.sign_in("anon1").await;
        let controller = h.controller();
        controller.check("alice").await.unwrap();
        controller.reserve().await.unwrap();

        let state = controller
            .finalize(&signup("a@b.com", "pw", "555-0100", true))
            .await
            .unwrap();
        assert_eq!(state.phase, Phase::FinalizeError);
        assert_eq!(
            state.error.as_deref(),
            Some("Password is too weak. Please use a stronger password.")
        );

        let state = controller
            .finalize(&signup("a@b.com", "pw123456", "555-0100", true))
            .await
            .unwrap();
        assert!(state.is_signed_up());
    }

    #[tokio::test]
    async fn test_signed_up_form_is_finished() {
        let h = Harness::new();
        h.sign_in("anon1").await;
        let controller = h.controller();
        controller.check("alice").await.unwrap();
        controller.reserve().await.unwrap();
        controller
            .finalize(&signup("a@b.com", "pw123456", "555-0100", true))
            .await
            .unwrap();

        let err = controller.edit_username("bob").await.unwrap_err();
        assert!(matches!(
            err,
            FormError::Transition(TransitionError::Finished)
        ));
    }

    #[tokio::test]
    async fn test_edit_username_resets_check() {
        let h = Harness::new();
        let controller = h.controller();
        controller.check("alice").await.unwrap();

        let state = controller.edit_username("Bob").await.unwrap();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.username, "bob");
        assert_eq!(state.availability, Availability::Unknown);
    }

    #[tokio::test]
    async fn test_dropped_check_still_settles() {
        let mut h = Harness::new();
        let gated = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            gate: Semaphore::new(0),
        });
        h.app = AppState::with_backends(SignupConfig::memory(), gated.clone(), h.provider.clone());

        let dropped =
            tokio::time::timeout(Duration::from_millis(50), h.controller().check("alice")).await;
        assert!(dropped.is_err());
        assert_eq!(h.reload().state().await.unwrap().phase, Phase::Checking);

        gated.gate.add_permits(1);
        let settled = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let state = h.reload().state().await.unwrap();
                if state.phase != Phase::Checking {
                    return state;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(settled.phase, Phase::Available);
        assert_eq!(settled.username, "alice");

        let state = h.reload().edit_username("bob").await.unwrap();
        assert_eq!(state.phase, Phase::Idle);
    }
}
