//! Visitor identity extractor.
//!
//! Every visitor works under an identity issued by the identity provider.
//! The first request of a session signs the visitor in, anonymously or with
//! the configured initial auth token, and stores the identity in the session.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use neoays_core::Identity;

use crate::error::{AppError, set_sentry_user};
use crate::models::session::keys;
use crate::state::AppState;

/// Extractor that yields the visitor's identity, signing them in if needed.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(VisitorIdentity(identity): VisitorIdentity) -> String {
///     format!("Your User ID: {}", identity.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct VisitorIdentity(pub Identity);

impl FromRequestParts<AppState> for VisitorIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))?;

        let identity = match session.get::<Identity>(keys::IDENTITY).await? {
            Some(identity) => identity,
            None => {
                let identity = match &state.config().initial_auth_token {
                    Some(token) => state.provider().sign_in_with_token(token).await?,
                    None => state.provider().sign_in_anonymously().await?,
                };
                session.insert(keys::IDENTITY, &identity).await?;
                tracing::info!(
                    identity_id = %identity.id,
                    anonymous = identity.is_anonymous,
                    "Visitor signed in"
                );
                identity
            }
        };

        set_sentry_user(
            &identity.id,
            identity.email.as_ref().map(neoays_core::Email::as_str),
        );

        Ok(Self(identity))
    }
}
