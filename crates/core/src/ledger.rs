//! LedgerStore trait: the remote text resource holding the shared ledger.
//!
//! The ledger is one UTF-8 blob. Stores only know how to return it whole and
//! overwrite it whole; they have no transactions. `replace` is
//! **last-writer-wins**: two writers interleaving `fetch`/`replace` can
//! silently drop each other's atoms.
//!
//! Stores that can compare-and-swap implement [`LedgerStore::replace_if`],
//! keyed on a [`LedgerVersion`] (content hash) taken at fetch time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Content version of a ledger blob (SHA-256, lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerVersion(pub String);

impl LedgerVersion {
    pub fn of(content: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(content.as_bytes())))
    }
}

impl std::fmt::Display for LedgerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The core LedgerStore trait.
///
/// Implementations: GitHub Gist (remote), local file, in-memory (testing).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The backend name (e.g., "gist", "file", "in_memory").
    fn name(&self) -> &str;

    /// Retrieve the full current ledger.
    async fn fetch(&self) -> Result<String, LedgerError>;

    /// Overwrite the ledger with `content` (already merged by the caller).
    async fn replace(&self, content: &str) -> Result<(), LedgerError>;

    /// Retrieve the ledger together with its content version.
    async fn fetch_versioned(&self) -> Result<(String, LedgerVersion), LedgerError> {
        let content = self.fetch().await?;
        let version = LedgerVersion::of(&content);
        Ok((content, version))
    }

    /// Overwrite the ledger only if it still has version `expected`.
    ///
    /// Default implementation reports the primitive as unsupported.
    async fn replace_if(
        &self,
        _expected: &LedgerVersion,
        _content: &str,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Unsupported(self.name().to_string()))
    }
}
