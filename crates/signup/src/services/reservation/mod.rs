//! Username reservation and signup workflow.
//!
//! Three operations, each a single awaited call returning a result:
//!
//! 1. [`check_availability`](ReservationWorkflow::check_availability) - read the username record
//! 2. [`reserve`](ReservationWorkflow::reserve) - write the username record for the caller
//! 3. [`finalize`](ReservationWorkflow::finalize) - create the account and write the profile
//!
//! The store has no cross-document transactions, so `finalize` is a saga of
//! [`SagaStep`]s run in order without retries. Nothing compensates for
//! `CreateAccount`: if a later step fails, the new account stays behind with
//! no profile and is logged for repair with `neoays-cli`.

mod error;

pub use error::WorkflowError;

use core::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use neoays_core::{
    Availability, DocumentPaths, Email, Identity, MobileNumber, ProfileRecord, Record, Username,
    UsernameRecord,
};

use crate::identity::{IdentityProvider, ProviderError};
use crate::store::{DocumentStore, StoreError, WriteMode};

/// How `reserve` writes the username record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservePolicy {
    /// Unconditional write. A later reservation replaces the owner.
    #[default]
    LastWriterWins,
    /// Conditional create. Fails if another identity holds the record.
    CreateIfAbsent,
}

impl ReservePolicy {
    /// Configuration name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastWriterWins => "last-writer-wins",
            Self::CreateIfAbsent => "create-if-absent",
        }
    }
}

impl fmt::Display for ReservePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "last-writer-wins" => Ok(Self::LastWriterWins),
            "create-if-absent" => Ok(Self::CreateIfAbsent),
            other => Err(format!(
                "unknown reserve policy {other:?} (expected last-writer-wins or create-if-absent)"
            )),
        }
    }
}

/// Steps of the signup saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    /// Create the persistent account with the identity provider.
    CreateAccount,
    /// Point the username record at the new account. Only for anonymous visitors.
    RelinkOwner,
    /// Write the profile record for the new account.
    WriteProfile,
}

impl SagaStep {
    /// Step name used in logs and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAccount => "create_account",
            Self::RelinkOwner => "relink_owner",
            Self::WriteProfile => "write_profile",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile fields submitted with the signup form.
#[derive(Debug, Clone)]
pub struct SignupForm {
    /// Account email.
    pub email: String,
    /// Account password. Only ever sent to the identity provider.
    pub password: SecretString,
    /// Contact number.
    pub mobile_number: String,
    /// Whether the privacy policy checkbox is ticked.
    pub privacy_accepted: bool,
}

impl SignupForm {
    /// Check the signup preconditions for reserved username `name`.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` naming the first field that fails.
    pub fn validate(&self, name: &str) -> Result<(), WorkflowError> {
        validate_signup(name, self).map(|_| ())
    }
}

/// Validated signup input.
struct ValidSignup {
    username: Username,
    email: Email,
    mobile_number: MobileNumber,
}

/// Reservation workflow over a document store and identity provider.
pub struct ReservationWorkflow<'a> {
    store: &'a dyn DocumentStore,
    provider: &'a dyn IdentityProvider,
    paths: &'a DocumentPaths,
    policy: ReservePolicy,
}

impl<'a> ReservationWorkflow<'a> {
    /// Create a workflow over the given backends.
    #[must_use]
    pub const fn new(
        store: &'a dyn DocumentStore,
        provider: &'a dyn IdentityProvider,
        paths: &'a DocumentPaths,
        policy: ReservePolicy,
    ) -> Self {
        Self {
            store,
            provider,
            paths,
            policy,
        }
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Check whether `name` is free.
    ///
    /// Read-only: the username record's existence is the whole answer.
    /// Callers treat any error as [`Availability::Taken`].
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` without touching the store if the
    /// name is invalid, `WorkflowError::Offline` if the store is unreachable,
    /// and `WorkflowError::Unknown` for any other store failure.
    #[instrument(skip(self))]
    pub async fn check_availability(&self, name: &str) -> Result<Availability, WorkflowError> {
        let username = parse_username(name)?;
        let path = self.paths.username(&username);

        match self.store.exists(&path).await {
            Ok(exists) => {
                let availability = Availability::from_exists(exists);
                tracing::debug!(%username, ?availability, "Checked username");
                Ok(availability)
            }
            Err(e) if e.is_offline() => {
                tracing::warn!(%username, error = %e, "Username check failed: store offline");
                Err(WorkflowError::Offline(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(%username, error = %e, "Username check failed");
                Err(WorkflowError::Unknown(e.to_string()))
            }
        }
    }

    // =========================================================================
    // Reservation
    // =========================================================================

    /// Claim `name` for `identity`.
    ///
    /// Anonymous identities may reserve. Under [`ReservePolicy::LastWriterWins`]
    /// the write replaces any existing owner.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` if there is no identity or the name
    /// is invalid, and `WorkflowError::ReservationFailed` if the write fails or,
    /// under [`ReservePolicy::CreateIfAbsent`], another identity holds the name.
    #[instrument(skip(self, identity), fields(identity_id = identity.map(|i| i.id.as_str())))]
    pub async fn reserve(
        &self,
        name: &str,
        identity: Option<&Identity>,
    ) -> Result<(), WorkflowError> {
        let Some(identity) = identity else {
            return Err(WorkflowError::validation(
                "identity",
                "You must be signed in to reserve a username.",
            ));
        };
        let username = parse_username(name)?;
        let path = self.paths.username(&username);
        let fields = UsernameRecord {
            owner_id: identity.id.clone(),
        }
        .to_fields()
        .map_err(|e| WorkflowError::ReservationFailed(e.to_string()))?;

        let result = match self.policy {
            ReservePolicy::LastWriterWins => {
                self.store.write(&path, fields, WriteMode::Replace).await
            }
            ReservePolicy::CreateIfAbsent => {
                let created = self.store.create(&path, fields).await;
                if matches!(created, Err(StoreError::AlreadyExists(_)))
                    && self.owned_by(&username, identity).await
                {
                    Ok(())
                } else {
                    created
                }
            }
        };

        result.map_err(|e| {
            tracing::warn!(%username, policy = %self.policy, error = %e, "Reservation failed");
            WorkflowError::ReservationFailed(e.to_string())
        })?;

        tracing::info!(%username, "Username reserved");
        Ok(())
    }

    /// Whether the username record names `identity` as its owner.
    async fn owned_by(&self, username: &Username, identity: &Identity) -> bool {
        match self.store.read(&self.paths.username(username)).await {
            Ok(Some(fields)) => UsernameRecord::from_fields(fields)
                .is_ok_and(|record| record.owner_id == identity.id),
            _ => false,
        }
    }

    // =========================================================================
    // Signup
    // =========================================================================

    /// Create the account for a reserved `name` and store its profile.
    ///
    /// `current` is the identity that reserved the name. When it is anonymous
    /// the username record is re-pointed at the new account.
    ///
    /// Returns the new persistent identity.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Validation` without any remote call if a field
    /// is empty or the privacy policy is not accepted. Returns
    /// `WorkflowError::EmailInUse`, `WorkflowError::WeakPassword` or
    /// `WorkflowError::SignupFailed` if account creation fails, and
    /// `WorkflowError::SignupFailed` naming the step if a later write fails.
    #[instrument(skip(self, current, form), fields(current_id = current.map(|i| i.id.as_str())))]
    pub async fn finalize(
        &self,
        name: &str,
        current: Option<&Identity>,
        form: &SignupForm,
    ) -> Result<Identity, WorkflowError> {
        let signup = validate_signup(name, form)?;

        // CreateAccount
        let account = self
            .provider
            .create_account(&signup.email, &form.password)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Account creation failed");
                match e {
                    ProviderError::EmailInUse => WorkflowError::EmailInUse,
                    ProviderError::WeakPassword(detail) => WorkflowError::WeakPassword(detail),
                    other => WorkflowError::SignupFailed {
                        step: SagaStep::CreateAccount,
                        detail: other.to_string(),
                    },
                }
            })?;
        tracing::info!(identity_id = %account.id, "Account created");

        // RelinkOwner
        if current.is_some_and(|identity| identity.is_anonymous) {
            let fields = UsernameRecord {
                owner_id: account.id.clone(),
            }
            .to_fields()
            .map_err(|e| e.to_string());
            let result = match fields {
                Ok(fields) => self
                    .store
                    .write(&self.paths.username(&signup.username), fields, WriteMode::Merge)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e),
            };
            if let Err(detail) = result {
                return Err(orphaned(&account, &signup.username, SagaStep::RelinkOwner, detail));
            }
        }

        // WriteProfile
        let profile = ProfileRecord {
            username: signup.username.clone(),
            email: signup.email,
            mobile_number: signup.mobile_number,
        };
        let result = match profile.to_fields() {
            Ok(fields) => self
                .store
                .write(&self.paths.profile(&account.id), fields, WriteMode::Replace)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(detail) = result {
            return Err(orphaned(&account, &signup.username, SagaStep::WriteProfile, detail));
        }

        tracing::info!(identity_id = %account.id, username = %signup.username, "Signup complete");
        Ok(account)
    }
}

fn parse_username(name: &str) -> Result<Username, WorkflowError> {
    Username::parse(name).map_err(|e| WorkflowError::invalid_username(&e))
}

/// Check every signup precondition before any remote call.
fn validate_signup(name: &str, form: &SignupForm) -> Result<ValidSignup, WorkflowError> {
    const ALL_REQUIRED: &str = "All fields are required.";

    if form.email.trim().is_empty() {
        return Err(WorkflowError::validation("email", ALL_REQUIRED));
    }
    if form.password.expose_secret().is_empty() {
        return Err(WorkflowError::validation("password", ALL_REQUIRED));
    }
    let mobile_number = MobileNumber::parse(&form.mobile_number)
        .map_err(|_| WorkflowError::validation("mobile_number", ALL_REQUIRED))?;

    if !form.privacy_accepted {
        return Err(WorkflowError::validation(
            "privacy_accepted",
            "You must accept the privacy policy to continue.",
        ));
    }

    let email = Email::parse(&form.email)
        .map_err(|_| WorkflowError::validation("email", "Please enter a valid email address."))?;
    let username = parse_username(name)?;

    Ok(ValidSignup {
        username,
        email,
        mobile_number,
    })
}

/// Log an account left without a profile and build the error for it.
fn orphaned(account: &Identity, username: &Username, step: SagaStep, detail: String) -> WorkflowError {
    tracing::error!(
        identity_id = %account.id,
        %username,
        %step,
        error = %detail,
        "Signup step failed after account creation; account has no profile"
    );
    WorkflowError::SignupFailed { step, detail }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::MemoryIdentityProvider;
    use crate::store::{MemoryStore, ScriptedFailure, StoreOp};
    use neoays_core::{Fields, IdentityId};
    use serde_json::json;

    struct Harness {
        store: MemoryStore,
        provider: MemoryIdentityProvider,
        paths: DocumentPaths,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                provider: MemoryIdentityProvider::new(),
                paths: DocumentPaths::new("artifacts", "neoays-stage0"),
            }
        }

        fn workflow(&self) -> ReservationWorkflow<'_> {
            self.workflow_with(ReservePolicy::LastWriterWins)
        }

        fn workflow_with(&self, policy: ReservePolicy) -> ReservationWorkflow<'_> {
            ReservationWorkflow::new(&self.store, &self.provider, &self.paths, policy)
        }

        fn username_path(&self, name: &str) -> neoays_core::DocumentPath {
            self.paths.username(&Username::parse(name).unwrap())
        }

        fn profile_path(&self, id: &str) -> neoays_core::DocumentPath {
            self.paths.profile(&IdentityId::parse(id).unwrap())
        }

        async fn seed_owner(&self, name: &str, owner: &str) {
            self.store
                .write(&self.username_path(name), owner_fields(owner), WriteMode::Replace)
                .await
                .unwrap();
        }
    }

    fn owner_fields(owner: &str) -> Fields {
        match json!({ "ownerId": owner }) {
            serde_json::Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn anonymous(id: &str) -> Identity {
        Identity::anonymous(IdentityId::parse(id).unwrap())
    }

    fn form(email: &str, password: &str, mobile: &str, privacy: bool) -> SignupForm {
        SignupForm {
            email: email.to_string(),
            password: SecretString::from(password),
            mobile_number: mobile.to_string(),
            privacy_accepted: privacy,
        }
    }

    // -------------------------------------------------------------------------
    // check_availability
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_check_short_names_never_reach_store() {
        let h = Harness::new();
        for name in ["", "a", "ab", "AB"] {
            let err = h.workflow().check_availability(name).await.unwrap_err();
            assert!(
                matches!(err, WorkflowError::Validation { field: "username", .. }),
                "{name:?}"
            );
            assert_eq!(
                err.user_message(),
                "Username must be at least 3 characters long."
            );
        }
        assert_eq!(h.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_check_absent_name_is_available() {
        let h = Harness::new();
        assert_eq!(
            h.workflow().check_availability("alice").await.unwrap(),
            Availability::Available
        );
        assert_eq!(h.store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_check_present_name_is_taken() {
        let h = Harness::new();
        h.seed_owner("bob", "u1").await;
        assert_eq!(
            h.workflow().check_availability("bob").await.unwrap(),
            Availability::Taken
        );
    }

    #[tokio::test]
    async fn test_check_normalizes_case() {
        let h = Harness::new();
        h.seed_owner("bob", "u1").await;
        assert_eq!(
            h.workflow().check_availability("BoB").await.unwrap(),
            Availability::Taken
        );
    }

    #[tokio::test]
    async fn test_check_is_idempotent() {
        let h = Harness::new();
        h.seed_owner("bob", "u1").await;
        let workflow = h.workflow();
        for name in ["alice", "bob"] {
            let first = workflow.check_availability(name).await.unwrap();
            let second = workflow.check_availability(name).await.unwrap();
            assert_eq!(first, second);
        }
        assert_eq!(h.store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_check_offline_is_retryable() {
        let h = Harness::new();
        h.store.fail(ScriptedFailure::offline(StoreOp::Read, "/"));
        let err = h.workflow().check_availability("alice").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Offline(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_check_other_failure_is_unknown() {
        let h = Harness::new();
        h.store
            .fail(ScriptedFailure::rejected(StoreOp::Read, "/", "internal"));
        let err = h.workflow().check_availability("alice").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Unknown(_)));
        assert!(!err.is_retryable());
    }

    // -------------------------------------------------------------------------
    // reserve
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reserve_writes_owner() {
        let h = Harness::new();
        h.workflow()
            .reserve("alice", Some(&anonymous("u2")))
            .await
            .unwrap();
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("u2"))
        );
    }

    #[tokio::test]
    async fn test_reserve_last_writer_wins() {
        let h = Harness::new();
        let workflow = h.workflow();
        workflow.reserve("alice", Some(&anonymous("a"))).await.unwrap();
        workflow.reserve("alice", Some(&anonymous("b"))).await.unwrap();
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("b"))
        );
    }

    #[tokio::test]
    async fn test_reserve_replaces_extra_fields() {
        let h = Harness::new();
        let mut fields = owner_fields("a");
        fields.insert("note".into(), json!("legacy"));
        h.store
            .write(&h.username_path("alice"), fields, WriteMode::Replace)
            .await
            .unwrap();

        h.workflow()
            .reserve("alice", Some(&anonymous("b")))
            .await
            .unwrap();
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("b"))
        );
    }

    #[tokio::test]
    async fn test_reserve_requires_identity() {
        let h = Harness::new();
        let err = h.workflow().reserve("alice", None).await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "You must be signed in to reserve a username."
        );
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reserve_write_failure() {
        let h = Harness::new();
        h.store.fail(ScriptedFailure::rejected(
            StoreOp::Write,
            "/",
            "Missing or insufficient permissions.",
        ));
        let err = h
            .workflow()
            .reserve("alice", Some(&anonymous("u2")))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ReservationFailed(_)));
        assert_eq!(
            err.user_message(),
            "Failed to reserve the username. It might be taken."
        );
    }

    #[tokio::test]
    async fn test_create_if_absent_keeps_first_owner() {
        let h = Harness::new();
        let workflow = h.workflow_with(ReservePolicy::CreateIfAbsent);
        workflow.reserve("alice", Some(&anonymous("a"))).await.unwrap();

        let err = workflow
            .reserve("alice", Some(&anonymous("b")))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ReservationFailed(_)));
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("a"))
        );

        // The owner reserving again is not an error.
        workflow.reserve("alice", Some(&anonymous("a"))).await.unwrap();
    }

    #[test]
    fn test_reserve_policy_parse() {
        assert_eq!(
            "last-writer-wins".parse::<ReservePolicy>(),
            Ok(ReservePolicy::LastWriterWins)
        );
        assert_eq!(
            "Create-If-Absent".parse::<ReservePolicy>(),
            Ok(ReservePolicy::CreateIfAbsent)
        );
        assert!("first-wins".parse::<ReservePolicy>().is_err());
        assert_eq!(ReservePolicy::default(), ReservePolicy::LastWriterWins);
        assert_eq!(ReservePolicy::CreateIfAbsent.to_string(), "create-if-absent");
    }

    // -------------------------------------------------------------------------
    // finalize
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_finalize_preconditions_make_no_remote_calls() {
        let h = Harness::new();
        let cases = [
            (form("", "pw123456", "555-0100", true), "email"),
            (form("  ", "pw123456", "555-0100", true), "email"),
            (form("a@b.com", "", "555-0100", true), "password"),
            (form("a@b.com", "pw123456", "", true), "mobile_number"),
            (form("a@b.com", "pw123456", "555-0100", false), "privacy_accepted"),
        ];

        for (input, expected) in &cases {
            let err = h
                .workflow()
                .finalize("alice", Some(&anonymous("anon1")), input)
                .await
                .unwrap_err();
            assert!(
                matches!(err, WorkflowError::Validation { field, .. } if field == *expected),
                "{expected}: {err:?}"
            );
        }

        assert_eq!(h.provider.create_calls(), 0);
        assert_eq!(h.store.write_count(), 0);
        assert_eq!(h.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_messages() {
        let h = Harness::new();
        let err = h
            .workflow()
            .finalize("alice", None, &form("", "", "", false))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "All fields are required.");

        let err = h
            .workflow()
            .finalize("alice", None, &form("a@b.com", "pw123456", "555", false))
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "You must accept the privacy policy to continue."
        );
    }

    #[tokio::test]
    async fn test_finalize_relinks_anonymous_reservation() {
        let h = Harness::new();
        let anon = anonymous("anon1");
        h.workflow().reserve("alice", Some(&anon)).await.unwrap();
        h.provider.queue_id(IdentityId::parse("u9").unwrap()).await;

        let account = h
            .workflow()
            .finalize(
                "alice",
                Some(&anon),
                &form("a@b.com", "pw123456", "555-0100", true),
            )
            .await
            .unwrap();

        assert_eq!(account.id.as_str(), "u9");
        assert!(!account.is_anonymous);
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("u9"))
        );
        let profile = h.store.get(&h.profile_path("u9")).await.unwrap();
        assert_eq!(
            serde_json::Value::Object(profile),
            json!({"username": "alice", "email": "a@b.com", "mobileNumber": "555-0100"})
        );
    }

    #[tokio::test]
    async fn test_finalize_without_anonymous_identity_skips_relink() {
        let h = Harness::new();
        let existing = Identity::persistent(
            IdentityId::parse("p1").unwrap(),
            Email::parse("old@b.com").unwrap(),
        );
        h.workflow().reserve("alice", Some(&existing)).await.unwrap();
        h.provider.queue_id(IdentityId::parse("u9").unwrap()).await;

        h.workflow()
            .finalize(
                "alice",
                Some(&existing),
                &form("a@b.com", "pw123456", "555-0100", true),
            )
            .await
            .unwrap();

        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("p1"))
        );
        assert!(h.store.get(&h.profile_path("u9")).await.is_some());
    }

    #[tokio::test]
    async fn test_finalize_email_in_use_writes_nothing() {
        let h = Harness::new();
        h.provider
            .create_account(&Email::parse("a@b.com").unwrap(), &SecretString::from("pw123456"))
            .await
            .unwrap();

        let err = h
            .workflow()
            .finalize(
                "alice",
                Some(&anonymous("anon1")),
                &form("a@b.com", "pw123456", "555-0100", true),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::EmailInUse));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_weak_password_writes_nothing() {
        let h = Harness::new();
        let err = h
            .workflow()
            .finalize(
                "alice",
                Some(&anonymous("anon1")),
                &form("a@b.com", "pw", "555-0100", true),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::WeakPassword(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_other_provider_failure() {
        let h = Harness::new();
        h.provider.fail_next_create("OPERATION_NOT_ALLOWED").await;
        let err = h
            .workflow()
            .finalize(
                "alice",
                Some(&anonymous("anon1")),
                &form("a@b.com", "pw123456", "555-0100", true),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::SignupFailed {
                step: SagaStep::CreateAccount,
                ..
            }
        ));
        assert!(err.user_message().starts_with("Sign-up failed: "));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_relink_failure_leaves_account() {
        let h = Harness::new();
        let anon = anonymous("anon1");
        h.workflow().reserve("alice", Some(&anon)).await.unwrap();
        h.provider.queue_id(IdentityId::parse("u9").unwrap()).await;
        h.store.fail(ScriptedFailure::rejected(
            StoreOp::Write,
            h.paths.public_root().as_str(),
            "permission denied",
        ));

        let err = h
            .workflow()
            .finalize(
                "alice",
                Some(&anon),
                &form("a@b.com", "pw123456", "555-0100", true),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::SignupFailed {
                step: SagaStep::RelinkOwner,
                ..
            }
        ));
        assert_eq!(
            h.provider.account_id(&Email::parse("a@b.com").unwrap()).await,
            Some(IdentityId::parse("u9").unwrap())
        );
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("anon1"))
        );
        assert!(h.store.get(&h.profile_path("u9")).await.is_none());
    }

    #[tokio::test]
    async fn test_finalize_profile_failure_leaves_account() {
        let h = Harness::new();
        let anon = anonymous("anon1");
        h.workflow().reserve("alice", Some(&anon)).await.unwrap();
        h.provider.queue_id(IdentityId::parse("u9").unwrap()).await;
        h.store.fail(ScriptedFailure::offline(
            StoreOp::Write,
            "/artifacts/neoays-stage0/users",
        ));

        let err = h
            .workflow()
            .finalize(
                "alice",
                Some(&anon),
                &form("a@b.com", "pw123456", "555-0100", true),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::SignupFailed {
                step: SagaStep::WriteProfile,
                ..
            }
        ));
        assert!(
            h.provider
                .account_id(&Email::parse("a@b.com").unwrap())
                .await
                .is_some()
        );
        assert_eq!(
            h.store.get(&h.username_path("alice")).await,
            Some(owner_fields("u9"))
        );
    }
}
