//! Neoays ID signup server library.
//!
//! A visitor is signed in anonymously on first visit, checks a username,
//! reserves it under their identity, and completes signup with email,
//! password and mobile number. The library exposes the router so it can be
//! served by the binary and driven by the integration tests.
//!
//! # Architecture
//!
//! - [`store`] - Document store trait with Firestore REST and in-memory backends
//! - [`identity`] - Identity provider trait with Firebase Auth and in-memory backends
//! - [`services::reservation`] - Availability check, reservation and signup saga
//! - [`services::form`] - Per-session form controller over the core state machine
//! - [`routes`] - Server-rendered pages and form actions

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::{
    Router,
    http::{HeaderValue, Request, header::CACHE_CONTROL},
    middleware::{from_fn, from_fn_with_state},
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod filters;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use state::AppState;

/// Build the application router with its middleware stack.
///
/// See [`middleware`] for the layer order.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        ))
        .service(ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")));

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", static_files)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .layer(session_layer)
        .layer(from_fn(middleware::csp_nonce_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
