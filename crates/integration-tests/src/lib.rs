//! Integration tests for the Neoays ID signup server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p neoays-integration-tests
//! ```
//!
//! Each test starts its own server on an ephemeral port, backed by the
//! in-memory document store and identity provider. The test keeps handles
//! to both backends to script failures and inspect what was written.

use std::net::SocketAddr;
use std::sync::Arc;

use neoays_core::{DocumentPaths, Fields, IdentityId, Username};
use neoays_signup::config::SignupConfig;
use neoays_signup::identity::MemoryIdentityProvider;
use neoays_signup::state::AppState;
use neoays_signup::store::MemoryStore;
use reqwest::{Client, Response, StatusCode, redirect::Policy};

/// A running signup server and a cookie-keeping client for one visitor.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MemoryIdentityProvider>,
    pub paths: DocumentPaths,
}

impl TestServer {
    /// Start a server with the default in-memory configuration.
    pub async fn start() -> Self {
        Self::start_with(SignupConfig::memory()).await
    }

    /// Start a server with `config` over fresh in-memory backends.
    pub async fn start_with(config: SignupConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MemoryIdentityProvider::new());
        let paths = config.documents.paths();
        let state = AppState::with_backends(config, store.clone(), provider.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(listener, neoays_signup::app(state))
                .await
                .expect("Test server error");
        });

        Self {
            addr,
            client: Self::visitor(),
            store,
            provider,
            paths,
        }
    }

    /// A new client with its own cookie jar. Redirects are not followed.
    pub fn visitor() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// GET `path` as this server's visitor.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Load the signup page and return its body.
    pub async fn page(&self) -> String {
        let resp = self.get("/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.text().await.expect("Failed to read page")
    }

    /// POST a form to `path` as this server's visitor.
    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// POST a form action and assert it redirected back to the page.
    pub async fn submit(&self, path: &str, form: &[(&str, &str)]) {
        let resp = self.post(path, form).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "POST {path}");
        assert_eq!(
            resp.headers()
                .get("location")
                .and_then(|v| v.to_str().ok()),
            Some("/")
        );
    }

    /// Queue ids the identity provider hands out next, in order.
    pub async fn queue_ids(&self, ids: &[&str]) {
        for id in ids {
            self.provider
                .queue_id(IdentityId::parse(id).expect("Invalid test id"))
                .await;
        }
    }

    /// Stored username record for `name`.
    pub async fn username_record(&self, name: &str) -> Option<Fields> {
        let username = Username::parse(name).expect("Invalid test username");
        self.store.get(&self.paths.username(&username)).await
    }

    /// Stored profile for `owner`.
    pub async fn profile_record(&self, owner: &str) -> Option<Fields> {
        let owner = IdentityId::parse(owner).expect("Invalid test id");
        self.store.get(&self.paths.profile(&owner)).await
    }
}

/// Build a field map from a JSON object literal.
pub fn fields(value: serde_json::Value) -> Fields {
    value
        .as_object()
        .cloned()
        .expect("Test fields must be a JSON object")
}
