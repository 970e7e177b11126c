//! File-based ledger store: the ledger as a local `knowledge_graph.metta`.
//!
//! Suitable when the notary and fleet manager share a filesystem. Replaces
//! write a sibling temp file and rename it over the ledger, so readers never
//! see a half-written blob. Conditional replaces are atomic within one
//! process only.

use std::path::PathBuf;

use async_trait::async_trait;
use echonet_core::error::LedgerError;
use echonet_core::ledger::{LedgerStore, LedgerVersion};
use tokio::sync::Mutex;
use tracing::debug;

pub struct FileLedgerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedgerStore {
    /// A missing file reads as an empty ledger; it is created on first replace.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<String, LedgerError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(LedgerError::Transport(format!(
                "Failed to read ledger file {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write(&self, content: &str) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LedgerError::Transport(format!("Failed to create ledger directory: {e}"))
            })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, content).await.map_err(|e| {
            LedgerError::Transport(format!("Failed to write ledger file {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            LedgerError::Transport(format!(
                "Failed to move ledger into place at {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), bytes = content.len(), "Ledger file written");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<String, LedgerError> {
        self.read().await
    }

    async fn replace(&self, content: &str) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        self.write(content).await
    }

    async fn replace_if(&self, expected: &LedgerVersion, content: &str) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        let found = LedgerVersion::of(&self.read().await?);
        if &found != expected {
            return Err(LedgerError::Conflict {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        self.write(content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileLedgerStore::new(dir.path().join("knowledge_graph.metta"));
        assert_eq!(store.fetch().await.unwrap(), "");
    }

    #[tokio::test]
    async fn replace_persists_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("knowledge_graph.metta");
        let store = FileLedgerStore::new(path.clone());

        store.replace("; header\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "; header\n");

        // A second store over the same file sees the content
        let other = FileLedgerStore::new(path);
        assert_eq!(other.fetch().await.unwrap(), "; header\n");
    }

    #[tokio::test]
    async fn replace_if_rejects_stale_version() {
        let dir = TempDir::new().unwrap();
        let store = FileLedgerStore::new(dir.path().join("kg.metta"));
        store.replace("v1").await.unwrap();

        let (_, version) = store.fetch_versioned().await.unwrap();
        store.replace("v1 + other writer").await.unwrap();

        let result = store.replace_if(&version, "v1 + mine").await;
        assert!(matches!(result, Err(LedgerError::Conflict { .. })));
        assert_eq!(store.fetch().await.unwrap(), "v1 + other writer");
    }
}
