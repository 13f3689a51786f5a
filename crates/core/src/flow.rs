//! Signup form state machine.
//!
//! The form moves through these phases:
//!
//! ```text
//! Idle -> Checking -> { Available | Taken | CheckError }
//! Available -> Reserving -> Reserved
//! Reserved -> Finalizing -> { SignedUp | FinalizeError }
//! ```
//!
//! [`transition`] is a pure function over `(state, event)`. The caller
//! performs the remote call between a `*Requested` event and its matching
//! `*Completed`/`*Failed` event. While a request is in flight every other
//! request is rejected with [`TransitionError::Busy`]; this is the only
//! concurrency guard a session has.
//!
//! Error events never clear entered input. They return the form to the
//! phase the visitor acted from, with a message attached.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::Availability;
use crate::types::{Username, UsernameError};

/// Phase of the signup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for a username to check.
    #[default]
    Idle,
    /// Availability check in flight.
    Checking,
    /// The checked username is free.
    Available,
    /// The checked username is taken.
    Taken,
    /// The check failed; treated as taken.
    CheckError,
    /// Reservation write in flight.
    Reserving,
    /// Username reserved, waiting for the profile form.
    Reserved,
    /// Account creation and profile writes in flight.
    Finalizing,
    /// Signup complete. Terminal.
    SignedUp,
    /// Finalization failed; the profile form is shown again.
    FinalizeError,
}

impl Phase {
    /// Whether a remote call is in flight.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Checking | Self::Reserving | Self::Finalizing)
    }

    /// Whether the username input is editable and can be checked.
    #[must_use]
    pub const fn accepts_username(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Available | Self::Taken | Self::CheckError
        )
    }

    /// Whether the profile form is shown.
    #[must_use]
    pub const fn accepts_profile(self) -> bool {
        matches!(self, Self::Reserved | Self::FinalizeError)
    }

    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Available => "available",
            Self::Taken => "taken",
            Self::CheckError => "check_error",
            Self::Reserving => "reserving",
            Self::Reserved => "reserved",
            Self::Finalizing => "finalizing",
            Self::SignedUp => "signed_up",
            Self::FinalizeError => "finalize_error",
        }
    }
}

/// Client-held form state. Never written to the document store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormState {
    /// Current phase.
    pub phase: Phase,
    /// Username input, lower-cased as entered.
    pub username: String,
    /// Result of the last availability check.
    pub availability: Availability,
    /// Error message shown under the form.
    pub error: Option<String>,
    /// Privacy policy checkbox.
    pub privacy_accepted: bool,
    /// Email input of the profile form.
    pub email: String,
    /// Mobile number input of the profile form.
    pub mobile_number: String,
}

impl FormState {
    /// Whether the form's controls are disabled.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.phase.is_in_flight()
    }

    /// Whether a username has been reserved and the profile form is active.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(
            self.phase,
            Phase::Reserved | Phase::Finalizing | Phase::FinalizeError
        )
    }

    /// Whether signup completed.
    #[must_use]
    pub const fn is_signed_up(&self) -> bool {
        matches!(self.phase, Phase::SignedUp)
    }
}

/// Something that happened to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The username input changed.
    UsernameEdited(String),
    /// The profile inputs changed. The password is never held in form state.
    ProfileEdited {
        /// Email input.
        email: String,
        /// Mobile number input.
        mobile_number: String,
    },
    /// The privacy checkbox was set.
    PrivacyToggled(bool),
    /// Input was rejected before any remote call.
    ValidationFailed(String),
    /// Availability check started.
    CheckRequested,
    /// Availability check finished.
    CheckCompleted(Availability),
    /// Availability check failed.
    CheckFailed(String),
    /// Reservation started.
    ReserveRequested,
    /// Reservation written.
    ReserveCompleted,
    /// Reservation write failed.
    ReserveFailed(String),
    /// Finalization started.
    FinalizeRequested,
    /// Account created and records written.
    FinalizeCompleted,
    /// Finalization failed at some step.
    FinalizeFailed(String),
}

impl Event {
    /// Stable name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UsernameEdited(_) => "username_edited",
            Self::ProfileEdited { .. } => "profile_edited",
            Self::PrivacyToggled(_) => "privacy_toggled",
            Self::ValidationFailed(_) => "validation_failed",
            Self::CheckRequested => "check_requested",
            Self::CheckCompleted(_) => "check_completed",
            Self::CheckFailed(_) => "check_failed",
            Self::ReserveRequested => "reserve_requested",
            Self::ReserveCompleted => "reserve_completed",
            Self::ReserveFailed(_) => "reserve_failed",
            Self::FinalizeRequested => "finalize_requested",
            Self::FinalizeCompleted => "finalize_completed",
            Self::FinalizeFailed(_) => "finalize_failed",
        }
    }

    /// Whether this event reports the outcome of a remote call.
    const fn is_settling(&self) -> bool {
        matches!(
            self,
            Self::CheckCompleted(_)
                | Self::CheckFailed(_)
                | Self::ReserveCompleted
                | Self::ReserveFailed(_)
                | Self::FinalizeCompleted
                | Self::FinalizeFailed(_)
        )
    }

    /// Whether this event settles the request in flight during `phase`.
    const fn settles(&self, phase: Phase) -> bool {
        matches!(
            (phase, self),
            (
                Phase::Checking,
                Self::CheckCompleted(_) | Self::CheckFailed(_)
            ) | (
                Phase::Reserving,
                Self::ReserveCompleted | Self::ReserveFailed(_)
            ) | (
                Phase::Finalizing,
                Self::FinalizeCompleted | Self::FinalizeFailed(_)
            )
        )
    }
}

/// Why an event was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Another request from this session is in flight.
    #[error("an operation is already in progress")]
    Busy,
    /// Signup already completed.
    #[error("signup is already complete")]
    Finished,
    /// The event does not apply in the current phase.
    #[error("{event} is not valid while {}", .phase.as_str())]
    Invalid {
        /// Phase the form was in.
        phase: Phase,
        /// Rejected event.
        event: &'static str,
    },
    /// The availability check guard failed.
    #[error("invalid username: {0}")]
    Username(#[from] UsernameError),
    /// The finalize guard failed.
    #[error("privacy policy not accepted")]
    PrivacyNotAccepted,
    /// The check completed without a result.
    #[error("availability check completed without a result")]
    MissingResult,
}

/// Apply `event` to `state`.
///
/// # Errors
///
/// - `Busy` if a request is in flight and `event` does not settle it
/// - `Finished` after signup completed
/// - `Invalid` if `event` does not apply in the current phase
/// - `Username` if a check is requested for an invalid username
/// - `PrivacyNotAccepted` if finalization is requested without consent
pub fn transition(state: &FormState, event: Event) -> Result<FormState, TransitionError> {
    let phase = state.phase;
    let invalid = TransitionError::Invalid {
        phase,
        event: event.name(),
    };

    if phase == Phase::SignedUp {
        return Err(TransitionError::Finished);
    }

    if event.is_settling() {
        if !event.settles(phase) {
            return Err(invalid);
        }
    } else if phase.is_in_flight() {
        return Err(TransitionError::Busy);
    }

    let mut next = state.clone();

    match event {
        Event::UsernameEdited(input) => {
            if !phase.accepts_username() {
                return Err(invalid);
            }
            next.username = Username::normalize(&input);
            next.availability = Availability::Unknown;
            next.phase = Phase::Idle;
        }
        Event::ProfileEdited {
            email,
            mobile_number,
        } => {
            if !phase.accepts_profile() {
                return Err(invalid);
            }
            next.email = email;
            next.mobile_number = mobile_number;
        }
        Event::PrivacyToggled(accepted) => {
            next.privacy_accepted = accepted;
        }
        Event::ValidationFailed(message) => {
            next.error = Some(message);
        }
        Event::CheckRequested => {
            if !phase.accepts_username() {
                return Err(invalid);
            }
            Username::parse(&state.username)?;
            next.phase = Phase::Checking;
            next.availability = Availability::Unknown;
            next.error = None;
        }
        Event::CheckCompleted(availability) => {
            next.phase = match availability {
                Availability::Available => Phase::Available,
                Availability::Taken => Phase::Taken,
                Availability::Unknown => return Err(TransitionError::MissingResult),
            };
            next.availability = availability;
        }
        Event::CheckFailed(message) => {
            // Fail closed: never suggest a name is free when it could not be confirmed
            next.phase = Phase::CheckError;
            next.availability = Availability::Taken;
            next.error = Some(message);
        }
        Event::ReserveRequested => {
            if phase != Phase::Available {
                return Err(invalid);
            }
            next.phase = Phase::Reserving;
            next.error = None;
        }
        Event::ReserveCompleted => {
            next.phase = Phase::Reserved;
        }
        Event::ReserveFailed(message) => {
            next.phase = Phase::Available;
            next.error = Some(message);
        }
        Event::FinalizeRequested => {
            if !phase.accepts_profile() {
                return Err(invalid);
            }
            if !state.privacy_accepted {
                return Err(TransitionError::PrivacyNotAccepted);
            }
            next.phase = Phase::Finalizing;
            next.error = None;
        }
        Event::FinalizeCompleted => {
            next.phase = Phase::SignedUp;
        }
        Event::FinalizeFailed(message) => {
            next.phase = Phase::FinalizeError;
            next.error = Some(message);
        }
    }

    Ok(next)
}
