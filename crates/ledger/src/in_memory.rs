//! In-memory ledger store: useful for testing and single-process demos.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use echonet_core::error::LedgerError;
use echonet_core::ledger::{LedgerStore, LedgerVersion};
use tokio::sync::RwLock;

/// A ledger held in a `String`.
///
/// Failures can be switched on to simulate an unreachable remote.
pub struct InMemoryLedgerStore {
    content: Arc<RwLock<String>>,
    fail_fetches: AtomicBool,
    fail_replaces: AtomicBool,
    fetches: AtomicUsize,
    replaces: AtomicUsize,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_content("")
    }

    /// Start from an existing ledger blob.
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: Arc::new(RwLock::new(content.into())),
            fail_fetches: AtomicBool::new(false),
            fail_replaces: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            replaces: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent `fetch` fail with a transport error.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `replace` fail with a transport error.
    pub fn fail_replaces(&self, fail: bool) {
        self.fail_replaces.store(fail, Ordering::SeqCst);
    }

    /// Current content, bypassing failure simulation.
    pub async fn content(&self) -> String {
        self.content.read().await.clone()
    }

    /// Overwrite the content directly, as an external mutator would.
    pub async fn set_content(&self, content: impl Into<String>) {
        *self.content.write().await = content.into();
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn replace_count(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    fn check_replace(&self) -> Result<(), LedgerError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        if self.fail_replaces.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated replace failure".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn fetch(&self) -> Result<String, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated fetch failure".into()));
        }
        Ok(self.content.read().await.clone())
    }

    async fn replace(&self, content: &str) -> Result<(), LedgerError> {
        self.check_replace()?;
        *self.content.write().await = content.to_string();
        Ok(())
    }

    async fn replace_if(&self, expected: &LedgerVersion, content: &str) -> Result<(), LedgerError> {
        self.check_replace()?;
        let mut current = self.content.write().await;
        let found = LedgerVersion::of(&current);
        if &found != expected {
            return Err(LedgerError::Conflict {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        *current = content.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_and_replace() {
        let store = InMemoryLedgerStore::with_content("; header\n");
        assert_eq!(store.fetch().await.unwrap(), "; header\n");

        store.replace("; header\n(location L1 \"x\" 1.0 2.0)\n").await.unwrap();
        assert!(store.fetch().await.unwrap().contains("location L1"));
        assert_eq!(store.fetch_count(), 2);
        assert_eq!(store.replace_count(), 1);
    }

    #[tokio::test]
    async fn simulated_failures() {
        let store = InMemoryLedgerStore::with_content("kept");
        store.fail_fetches(true);
        store.fail_replaces(true);
        assert!(matches!(store.fetch().await, Err(LedgerError::Transport(_))));
        assert!(matches!(store.replace("lost").await, Err(LedgerError::Transport(_))));
        assert_eq!(store.content().await, "kept");
    }

    #[tokio::test]
    async fn replace_if_detects_concurrent_change() {
        let store = InMemoryLedgerStore::with_content("v1");
        let (_, version) = store.fetch_versioned().await.unwrap();

        store.set_content("v1 + someone else").await;
        let result = store.replace_if(&version, "v1 + mine").await;
        assert!(matches!(result, Err(LedgerError::Conflict { .. })));
        assert_eq!(store.content().await, "v1 + someone else");

        let (_, fresh) = store.fetch_versioned().await.unwrap();
        store.replace_if(&fresh, "v2").await.unwrap();
        assert_eq!(store.content().await, "v2");
    }
}
