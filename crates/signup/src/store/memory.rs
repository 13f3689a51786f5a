//! In-process document store.
//!
//! Used by the test suites and by `NEOAYS_BACKEND=memory` for local runs.
//! Failures can be scripted per operation and path prefix so callers can
//! exercise offline and partial-failure paths deterministically.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use neoays_core::{DocumentPath, Fields};

use super::{DocumentStore, StoreError, WriteMode};

/// Store operation, used to target scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// `exists` or `read`.
    Read,
    /// `write` or `create`.
    Write,
}

/// A failure injected into matching operations.
#[derive(Debug, Clone)]
pub struct ScriptedFailure {
    op: StoreOp,
    prefix: String,
    kind: FailureKind,
}

#[derive(Debug, Clone)]
enum FailureKind {
    Offline,
    Rejected(String),
}

impl ScriptedFailure {
    /// Fail operations of kind `op` under `prefix` as if the store were unreachable.
    #[must_use]
    pub fn offline(op: StoreOp, prefix: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into(),
            kind: FailureKind::Offline,
        }
    }

    /// Reject operations of kind `op` under `prefix` with `message`.
    #[must_use]
    pub fn rejected(op: StoreOp, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into(),
            kind: FailureKind::Rejected(message.into()),
        }
    }

    fn matches(&self, op: StoreOp, path: &DocumentPath) -> bool {
        self.op == op && path.starts_with(&self.prefix)
    }

    fn to_error(&self) -> StoreError {
        match &self.kind {
            FailureKind::Offline => {
                StoreError::Unavailable("client is offline".to_string())
            }
            FailureKind::Rejected(message) => StoreError::Rejected {
                status: 500,
                message: message.clone(),
            },
        }
    }
}

/// Document store backed by an in-memory map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<DocumentPath, Fields>>,
    failures: Mutex<Vec<ScriptedFailure>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure. It stays active until [`clear_failures`](Self::clear_failures).
    pub fn fail(&self, failure: ScriptedFailure) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(failure);
        }
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    /// Number of read operations attempted.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful write operations.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current contents of the document at `path`.
    pub async fn get(&self, path: &DocumentPath) -> Option<Fields> {
        self.documents.read().await.get(path).cloned()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn check(&self, op: StoreOp, path: &DocumentPath) -> Result<(), StoreError> {
        let failures = self
            .failures
            .lock()
            .map_err(|_| StoreError::Unavailable("failure script poisoned".to_string()))?;
        match failures.iter().find(|f| f.matches(op, path)) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn exists(&self, path: &DocumentPath) -> Result<bool, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check(StoreOp::Read, path)?;
        Ok(self.documents.read().await.contains_key(path))
    }

    async fn read(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check(StoreOp::Read, path)?;
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn write(
        &self,
        path: &DocumentPath,
        fields: Fields,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        self.check(StoreOp::Write, path)?;
        let mut documents = self.documents.write().await;
        match (mode, documents.get_mut(path)) {
            (WriteMode::Merge, Some(existing)) => existing.extend(fields),
            _ => {
                documents.insert(path.clone(), fields);
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.check(StoreOp::Write, path)?;
        let mut documents = self.documents.write().await;
        if documents.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        documents.insert(path.clone(), fields);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
