//! Static page route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::filters;
use crate::middleware::CspNonce;
use crate::state::AppState;

/// Privacy notice template.
#[derive(Template, WebTemplate)]
#[template(path = "privacy.html")]
pub struct PrivacyTemplate {
    pub measurement_id: Option<String>,
    pub nonce: String,
}

/// Display the privacy notice shown next to the signup form.
#[instrument(skip_all)]
pub async fn privacy(State(state): State<AppState>, nonce: CspNonce) -> impl IntoResponse {
    PrivacyTemplate {
        measurement_id: state.config().analytics.measurement_id.clone(),
        nonce: nonce.value().to_string(),
    }
}
