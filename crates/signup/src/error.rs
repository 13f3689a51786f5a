//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Reservation workflow errors never reach this type: the form controller
//! turns them into the form's error message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use neoays_core::TransitionError;

use crate::identity::ProviderError;
use crate::services::form::FormError;

/// Application-level error type for the signup server.
#[derive(Debug, Error)]
pub enum AppError {
    /// The form could not be driven.
    #[error("Form error: {0}")]
    Form(#[from] FormError),

    /// Signing the visitor in failed.
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Session storage failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Form(FormError::Transition(
                TransitionError::Busy | TransitionError::Finished | TransitionError::Invalid { .. },
            )) => StatusCode::CONFLICT,
            Self::Form(FormError::Transition(_)) => StatusCode::BAD_REQUEST,
            Self::Provider(ProviderError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Form(FormError::Session(_) | FormError::Task(_))
            | Self::Session(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Form(FormError::Transition(TransitionError::Busy)) => {
                "Another request is still in progress. Please wait.".to_string()
            }
            Self::Form(FormError::Transition(TransitionError::Finished)) => {
                "Your Neoays ID is already reserved.".to_string()
            }
            Self::Form(FormError::Transition(err)) => err.to_string(),
            Self::Provider(_) => "Could not sign you in. Please try again.".to_string(),
            Self::Form(FormError::Session(_) | FormError::Task(_))
            | Self::Session(_)
            | Self::Internal(_) => "Internal server error".to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an identity.
///
/// Call this once the visitor has an identity to associate errors with it.
pub fn set_sentry_user(identity_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(identity_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("signup", "Checked username", Some(&[("username", "alice")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
