//! Session middleware configuration.
//!
//! Sessions hold the visitor's identity and form state in process memory
//! (`tower_sessions::MemoryStore`). They do not survive a restart; a visitor
//! whose session is lost starts over with a new anonymous identity.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::SignupConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "neoays_session";

/// Session expiry time in seconds (1 day).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &SignupConfig) -> SessionManagerLayer<MemoryStore> {
    // Secure cookies only when served over HTTPS
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
