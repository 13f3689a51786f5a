//! HTTP route handlers for the signup server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Signup page (signs the visitor in on first visit)
//! GET  /privacy                - Privacy notice
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (document store reachable)
//!
//! # Form actions (redirect to /)
//! POST /username/edit          - Replace the username input
//! POST /username/check         - Check availability
//! POST /username/reserve       - Reserve the available name
//! POST /signup                 - Create the account and profile
//! ```

pub mod health;
pub mod pages;
pub mod signup;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the username routes router.
pub fn username_routes() -> Router<AppState> {
    Router::new()
        .route("/edit", post(signup::edit_username))
        .route("/check", post(signup::check))
        .route("/reserve", post(signup::reserve))
}

/// Create all routes for the signup server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(signup::index))
        .route("/signup", post(signup::signup))
        .route("/privacy", get(pages::privacy))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/username", username_routes())
}
