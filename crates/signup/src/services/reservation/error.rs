//! Reservation workflow error types.

use thiserror::Error;

use neoays_core::UsernameError;

use super::SagaStep;

/// Errors returned by the reservation workflow.
///
/// Each variant maps to one message shown on the form; see
/// [`WorkflowError::user_message`].
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Input failed a precondition. No remote call was made.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Form field that failed.
        field: &'static str,
        /// Message shown to the visitor.
        message: String,
    },

    /// The document store could not be reached while checking.
    #[error("document store offline: {0}")]
    Offline(String),

    /// Writing the username record failed.
    #[error("reservation failed: {0}")]
    ReservationFailed(String),

    /// The provider already has an account for this email.
    #[error("email already in use")]
    EmailInUse,

    /// The provider rejected the password.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// A signup step failed.
    #[error("signup failed at {step}: {detail}")]
    SignupFailed {
        /// Step that failed.
        step: SagaStep,
        /// What went wrong.
        detail: String,
    },

    /// The availability check failed for a reason other than connectivity.
    #[error("availability check failed: {0}")]
    Unknown(String),
}

impl WorkflowError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_username(err: &UsernameError) -> Self {
        let message = match err {
            UsernameError::TooShort { min } => {
                format!("Username must be at least {min} characters long.")
            }
            UsernameError::TooLong { max } => {
                format!("Username must be at most {max} characters long.")
            }
            UsernameError::InvalidCharacter(c) if c.is_whitespace() => {
                "Username cannot contain spaces.".to_string()
            }
            UsernameError::InvalidCharacter(c) => format!("Username cannot contain '{c}'."),
            UsernameError::Reserved(name) => format!("The username \"{name}\" is not allowed."),
        };
        Self::validation("username", message)
    }

    /// Message shown on the form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::Offline(_) => {
                "Cannot check username while offline. Please check your internet connection."
                    .to_string()
            }
            Self::ReservationFailed(_) => {
                "Failed to reserve the username. It might be taken.".to_string()
            }
            Self::EmailInUse => {
                "This email is already in use. Please sign in or use a different email."
                    .to_string()
            }
            Self::WeakPassword(_) => {
                "Password is too weak. Please use a stronger password.".to_string()
            }
            Self::SignupFailed { detail, .. } => format!("Sign-up failed: {detail}"),
            Self::Unknown(_) => "An error occurred while checking the username.".to_string(),
        }
    }

    /// Whether trying again unchanged may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}
