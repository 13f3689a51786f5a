//! Cloud Firestore document store over the REST API.
//!
//! # API Reference
//!
//! - Base URL: `https://firestore.googleapis.com/v1`
//! - Documents: `projects/{project}/databases/(default)/documents/{path}`
//! - Authentication: web API key via `?key=`, plus an optional OAuth bearer token
//!
//! Reads map `404` to "absent". Writes are `PATCH` requests: a merge write sets
//! `updateMask.fieldPaths` to the written fields, and a conditional create sets
//! `currentDocument.exists=false`.

mod value;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use neoays_core::{DocumentPath, Fields};

use super::{DocumentStore, StoreError, WriteMode};
use crate::config::FirebaseConfig;

/// Firestore REST API base URL.
const BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Firestore REST client.
#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<FirestoreStoreInner>,
}

struct FirestoreStoreInner {
    client: reqwest::Client,
    documents_url: Url,
    project_id: String,
    api_key: SecretString,
    access_token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl FirestoreStore {
    /// Create a client for the project in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(FirestoreStoreInner {
                client,
                documents_url: documents_url(BASE_URL, &config.project_id)?,
                project_id: config.project_id.clone(),
                api_key: config.api_key.clone(),
                access_token: config.firestore_access_token.clone(),
            }),
        })
    }

    /// Point the client at another endpoint, such as the local emulator.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidUrl` if `base_url` is not an HTTP URL.
    pub fn with_base_url(self, base_url: &str) -> Result<Self, StoreError> {
        let inner = &self.inner;
        Ok(Self {
            inner: Arc::new(FirestoreStoreInner {
                client: inner.client.clone(),
                documents_url: documents_url(base_url, &inner.project_id)?,
                project_id: inner.project_id.clone(),
                api_key: inner.api_key.clone(),
                access_token: inner.access_token.clone(),
            }),
        })
    }

    /// REST URL of the document at `path`, one escaped URL segment per path segment.
    fn document_url(&self, path: &DocumentPath) -> Url {
        let mut url = self.inner.documents_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.segments());
        }
        url
    }

    fn request(&self, method: reqwest::Method, path: &DocumentPath) -> reqwest::RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, self.document_url(path))
            .query(&[("key", self.inner.api_key.expose_secret())]);

        match &self.inner.access_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn patch(
        &self,
        path: &DocumentPath,
        fields: &Fields,
        query: &[(&str, &str)],
    ) -> Result<(), StoreError> {
        let body = json!({ "fields": value::encode_fields(fields) });
        let response = self
            .request(reqwest::Method::PATCH, path)
            .query(query)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status, &text, path))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn exists(&self, path: &DocumentPath) -> Result<bool, StoreError> {
        // Only the existence matters; ask for no fields.
        let response = self
            .request(reqwest::Method::GET, path)
            .query(&[("mask.fieldPaths", "__name__")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if status.is_success() {
            return Ok(true);
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status, &text, path))
    }

    async fn read(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text, path));
        }

        let document: DocumentResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("Failed to parse document: {e}")))?;
        value::decode_fields(&document.fields).map(Some)
    }

    async fn write(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mask: Vec<(&str, &str)> = match mode {
            WriteMode::Replace => Vec::new(),
            WriteMode::Merge => fields
                .keys()
                .map(|name| ("updateMask.fieldPaths", name.as_str()))
                .collect(),
        };
        tracing::debug!(path = %path, ?mode, "Writing document");
        self.patch(path, &fields, &mask).await
    }

    async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        tracing::debug!(path = %path, "Creating document");
        self.patch(path, &fields, &[("currentDocument.exists", "false")])
            .await
    }
}

impl std::fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("documents_url", &self.inner.documents_url.as_str())
            .field("project_id", &self.inner.project_id)
            .finish_non_exhaustive()
    }
}

/// Documents root of `project_id` under `base_url`.
fn documents_url(base_url: &str, project_id: &str) -> Result<Url, StoreError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|()| StoreError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(["projects", project_id, "databases", "(default)", "documents"]);
    Ok(url)
}

/// Map a failed Firestore response onto a store error.
fn classify_error(status: StatusCode, body: &str, path: &DocumentPath) -> StoreError {
    let (code, message) = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| (String::new(), body.to_string()),
        |envelope| (envelope.error.status, envelope.error.message),
    );

    match code.as_str() {
        "ALREADY_EXISTS" | "FAILED_PRECONDITION" => {
            return StoreError::AlreadyExists(path.to_string());
        }
        "PERMISSION_DENIED" | "UNAUTHENTICATED" => {
            return StoreError::PermissionDenied(message);
        }
        "UNAVAILABLE" | "DEADLINE_EXCEEDED" => return StoreError::Unavailable(message),
        _ => {}
    }

    match status {
        StatusCode::CONFLICT => StoreError::AlreadyExists(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            StoreError::Unavailable(message)
        }
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}
