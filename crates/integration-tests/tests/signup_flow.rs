//! End-to-end tests for the username reservation and signup flow.
//!
//! Run with: cargo test -p neoays-integration-tests

#![allow(clippy::unwrap_used)]

use neoays_integration_tests::{TestServer, fields};
use neoays_signup::store::{DocumentStore, ScriptedFailure, StoreOp, WriteMode};
use reqwest::StatusCode;
use serde_json::json;

/// The id shown after "Your User ID:".
fn shown_identity(page: &str) -> &str {
    let start = page.find("Your User ID: <code>").expect("No identity on page") + 20;
    let len = page[start..].find("</code>").expect("Unterminated identity");
    &page[start..start + len]
}

const PROFILE: &[(&str, &str)] = &[
    ("email", "a@b.com"),
    ("password", "pw123456"),
    ("mobile_number", "555-0100"),
    ("privacy_accepted", "on"),
];

/// Visit, check and reserve `name` as the visitor's anonymous identity.
async fn reserve(server: &TestServer, name: &str) {
    server.page().await;
    server
        .submit("/username/check", &[("username", name)])
        .await;
    server.submit("/username/reserve", &[]).await;
}

// ============================================================================
// Pages
// ============================================================================

#[tokio::test]
async fn test_first_visit_signs_in_anonymously() {
    let server = TestServer::start().await;
    server.queue_ids(&["anon1"]).await;

    let page = server.page().await;
    assert!(page.contains("Reserve your Neoays ID"));
    assert!(page.contains("Check and reserve your unique username."));
    assert!(page.contains("Check Availability"));
    assert_eq!(shown_identity(&page), "anon1");

    // Same session keeps the same identity
    let page = server.page().await;
    assert_eq!(shown_identity(&page), "anon1");
}

#[tokio::test]
async fn test_each_visitor_gets_own_identity() {
    let server = TestServer::start().await;
    let first = server.page().await;

    let other = TestServer::visitor();
    let second = other
        .get(server.url("/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_ne!(shown_identity(&first), shown_identity(&second));
}

#[tokio::test]
async fn test_privacy_page() {
    let server = TestServer::start().await;
    let resp = server.get("/privacy").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("We will not sell your data."));
}

#[tokio::test]
async fn test_security_headers() {
    let server = TestServer::start().await;
    let resp = server.get("/").await;
    let headers = resp.headers();

    let csp = headers
        .get("content-security-policy")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(csp.contains("form-action 'self'"));
    assert!(csp.contains("frame-ancestors 'none'"));
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("x-request-id").is_some());
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::start().await;

    let resp = server.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    assert_eq!(server.get("/health/ready").await.status(), StatusCode::OK);

    server
        .store
        .fail(ScriptedFailure::offline(StoreOp::Read, "/"));
    assert_eq!(
        server.get("/health/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

// ============================================================================
// Availability
// ============================================================================

#[tokio::test]
async fn test_available_username() {
    let server = TestServer::start().await;
    server.page().await;

    server
        .submit("/username/check", &[("username", "Alice")])
        .await;
    let page = server.page().await;
    assert!(page.contains("✅ Username is available!"));
    assert!(page.contains("Reserve Now"));
    assert!(page.contains("value=\"alice\""));
}

#[tokio::test]
async fn test_taken_username() {
    let server = TestServer::start().await;
    let path = server
        .paths
        .username(&neoays_core::Username::parse("bob").unwrap());
    server
        .store
        .write(&path, fields(json!({"ownerId": "someone"})), WriteMode::Replace)
        .await
        .unwrap();
    server.page().await;

    server.submit("/username/check", &[("username", "bob")]).await;
    let page = server.page().await;
    assert!(page.contains("❌ That name is taken or too short."));
    assert!(!page.contains("Reserve Now"));
}

#[tokio::test]
async fn test_short_username_is_not_checked() {
    let server = TestServer::start().await;
    server.page().await;

    server.submit("/username/check", &[("username", "ab")]).await;
    let page = server.page().await;
    assert!(page.contains("Username must be at least 3 characters long."));
    assert_eq!(server.store.read_count(), 0);
}

#[tokio::test]
async fn test_offline_check_fails_closed() {
    let server = TestServer::start().await;
    server.page().await;
    server
        .store
        .fail(ScriptedFailure::offline(StoreOp::Read, "/"));

    server
        .submit("/username/check", &[("username", "alice")])
        .await;
    let page = server.page().await;
    assert!(page.contains(
        "Cannot check username while offline. Please check your internet connection."
    ));
    assert!(page.contains("❌ That name is taken or too short."));
    assert!(!page.contains("Reserve Now"));
}

#[tokio::test]
async fn test_edit_resets_availability() {
    let server = TestServer::start().await;
    server.page().await;
    server
        .submit("/username/check", &[("username", "alice")])
        .await;

    server
        .submit("/username/edit", &[("username", "alice2")])
        .await;
    let page = server.page().await;
    assert!(!page.contains("Reserve Now"));
    assert!(page.contains("value=\"alice2\""));
}

// ============================================================================
// Reservation
// ============================================================================

#[tokio::test]
async fn test_reserve_records_anonymous_owner() {
    let server = TestServer::start().await;
    server.queue_ids(&["anon1"]).await;
    reserve(&server, "alice").await;

    let page = server.page().await;
    assert!(page.contains("Username <strong>@alice</strong> is reserved."));
    assert!(page.contains("Complete your profile to secure your ID."));
    assert_eq!(
        server.username_record("alice").await,
        Some(fields(json!({"ownerId": "anon1"})))
    );
}

#[tokio::test]
async fn test_reserve_without_check_conflicts() {
    let server = TestServer::start().await;
    server.page().await;

    let resp = server.post("/username/reserve", &[]).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(server.store.write_count(), 0);
}

#[tokio::test]
async fn test_username_locked_after_reserve() {
    let server = TestServer::start().await;
    reserve(&server, "alice").await;

    let resp = server
        .post("/username/check", &[("username", "other")])
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

// ============================================================================
// Signup
// ============================================================================

#[tokio::test]
async fn test_full_signup_relinks_owner() {
    let server = TestServer::start().await;
    server.queue_ids(&["anon1", "u9"]).await;
    reserve(&server, "alice").await;

    server.submit("/signup", PROFILE).await;
    let page = server.page().await;
    assert!(page.contains("✅ Your Neoays ID is reserved! Welcome!"));
    assert_eq!(shown_identity(&page), "u9");

    assert_eq!(
        server.username_record("alice").await,
        Some(fields(json!({"ownerId": "u9"})))
    );
    assert_eq!(
        server.profile_record("u9").await,
        Some(fields(json!({
            "username": "alice",
            "email": "a@b.com",
            "mobileNumber": "555-0100"
        })))
    );
    assert_eq!(server.profile_record("anon1").await, None);
}

#[tokio::test]
async fn test_signup_is_final() {
    let server = TestServer::start().await;
    reserve(&server, "alice").await;
    server.submit("/signup", PROFILE).await;

    let resp = server.post("/signup", PROFILE).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(
        resp.text().await.unwrap(),
        "Your Neoays ID is already reserved."
    );
    assert_eq!(server.provider.create_calls(), 1);
}

#[tokio::test]
async fn test_signup_requires_all_fields() {
    let server = TestServer::start().await;
    reserve(&server, "alice").await;

    server
        .submit(
            "/signup",
            &[
                ("email", ""),
                ("password", "pw123456"),
                ("mobile_number", "555-0100"),
                ("privacy_accepted", "on"),
            ],
        )
        .await;
    let page = server.page().await;
    assert!(page.contains("All fields are required."));
    assert!(page.contains("value=\"555-0100\""));
    assert_eq!(server.provider.create_calls(), 0);
}

#[tokio::test]
async fn test_signup_requires_privacy_consent() {
    let server = TestServer::start().await;
    reserve(&server, "alice").await;

    server
        .submit("/signup", PROFILE.get(..3).unwrap())
        .await;
    let page = server.page().await;
    assert!(page.contains("You must accept the privacy policy to continue."));
    assert_eq!(server.provider.create_calls(), 0);
}

#[tokio::test]
async fn test_email_in_use_writes_nothing() {
    let server = TestServer::start().await;
    server.queue_ids(&["anon1"]).await;
    reserve(&server, "alice").await;
    server.provider.fail_next_create("EMAIL_EXISTS").await;

    server.submit("/signup", PROFILE).await;
    let page = server.page().await;
    assert!(page.contains("This email is already in use."));
    assert!(page.contains("Complete Sign Up"));
    assert_eq!(
        server.username_record("alice").await,
        Some(fields(json!({"ownerId": "anon1"})))
    );
    assert_eq!(server.store.len().await, 1);

    // The form stays usable for a retry
    server.submit("/signup", PROFILE).await;
    let page = server.page().await;
    assert!(page.contains("✅ Your Neoays ID is reserved! Welcome!"));
}

#[tokio::test]
async fn test_weak_password() {
    let server = TestServer::start().await;
    reserve(&server, "alice").await;

    server
        .submit(
            "/signup",
            &[
                ("email", "a@b.com"),
                ("password", "pw"),
                ("mobile_number", "555-0100"),
                ("privacy_accepted", "on"),
            ],
        )
        .await;
    let page = server.page().await;
    assert!(page.contains("Password is too weak. Please use a stronger password."));
}
