//! Signup form route handlers.
//!
//! The page is rendered from the session's form state. Every form action is
//! a POST that drives the form controller and redirects back to `/`
//! (post/redirect/get), so a reload never resubmits an action.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use neoays_core::{Availability, FormState, Phase};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, VisitorIdentity};
use crate::services::form::FormController;
use crate::services::reservation::SignupForm;
use crate::state::AppState;

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub identity_id: String,
    pub form: FormState,
    pub checking: bool,
    pub available: bool,
    pub taken: bool,
    pub measurement_id: Option<String>,
    pub nonce: String,
}

impl IndexTemplate {
    fn new(identity_id: String, form: FormState, state: &AppState, nonce: &CspNonce) -> Self {
        Self {
            identity_id,
            checking: form.phase == Phase::Checking,
            available: form.phase == Phase::Available
                && form.availability == Availability::Available,
            taken: form.availability == Availability::Taken,
            form,
            measurement_id: state.config().analytics.measurement_id.clone(),
            nonce: nonce.value().to_string(),
        }
    }
}

/// Username form data.
#[derive(Debug, Deserialize)]
pub struct UsernameForm {
    pub username: String,
}

/// Profile form data.
#[derive(Deserialize)]
pub struct ProfileForm {
    pub email: String,
    pub password: String,
    pub mobile_number: String,
    /// Checkbox; present as `on` when ticked.
    pub privacy_accepted: Option<String>,
}

impl From<ProfileForm> for SignupForm {
    fn from(form: ProfileForm) -> Self {
        Self {
            email: form.email,
            password: SecretString::from(form.password),
            mobile_number: form.mobile_number,
            privacy_accepted: form.privacy_accepted.is_some(),
        }
    }
}

/// Display the signup page.
///
/// The first visit of a session signs the visitor in.
///
/// # Errors
///
/// Returns an error if the visitor cannot be signed in or the session
/// cannot be read.
#[instrument(skip_all, fields(identity_id = tracing::field::Empty))]
pub async fn index(
    State(state): State<AppState>,
    VisitorIdentity(identity): VisitorIdentity,
    session: Session,
    nonce: CspNonce,
) -> Result<impl IntoResponse> {
    tracing::Span::current().record("identity_id", identity.id.as_str());
    let form = FormController::new(session, state.clone())
        .state()
        .await?;

    Ok(IndexTemplate::new(
        identity.id.into_inner(),
        form,
        &state,
        &nonce,
    ))
}

/// Replace the username input.
///
/// # Errors
///
/// Returns 409 while a request is in flight or once a name is reserved.
#[instrument(skip(state, session))]
pub async fn edit_username(
    State(state): State<AppState>,
    session: Session,
    Form(input): Form<UsernameForm>,
) -> Result<Redirect> {
    FormController::new(session, state)
        .edit_username(&input.username)
        .await?;
    Ok(Redirect::to("/"))
}

/// Check whether the entered username is available.
///
/// # Errors
///
/// Returns 409 while a request is in flight or once a name is reserved.
#[instrument(skip(state, session))]
pub async fn check(
    State(state): State<AppState>,
    session: Session,
    Form(input): Form<UsernameForm>,
) -> Result<Redirect> {
    let form = FormController::new(session, state)
        .check(&input.username)
        .await?;

    add_breadcrumb(
        "signup",
        "Checked username",
        Some(&[("username", form.username.as_str()), ("phase", form.phase.as_str())]),
    );
    Ok(Redirect::to("/"))
}

/// Reserve the username that was just found available.
///
/// # Errors
///
/// Returns 409 unless the form is showing an available name.
#[instrument(skip_all)]
pub async fn reserve(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let form = FormController::new(session, state)
        .reserve()
        .await?;

    if form.is_reserved() {
        tracing::info!(username = %form.username, "Username reserved");
    }
    add_breadcrumb(
        "signup",
        "Reserved username",
        Some(&[("username", form.username.as_str()), ("phase", form.phase.as_str())]),
    );
    Ok(Redirect::to("/"))
}

/// Complete signup for the reserved username.
///
/// # Errors
///
/// Returns 409 unless a username is reserved.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(input): Form<ProfileForm>,
) -> Result<Redirect> {
    let form = FormController::new(session, state)
        .finalize(&input.into())
        .await?;

    if form.is_signed_up() {
        tracing::info!(username = %form.username, "Signup completed");
    }
    add_breadcrumb(
        "signup",
        "Submitted profile",
        Some(&[("username", form.username.as_str()), ("phase", form.phase.as_str())]),
    );
    Ok(Redirect::to("/"))
}
