//! Ledger implementations for EchoNet.
//!
//! - [`grammar`]: the line-oriented fact grammar shared by writer and readers
//! - [`GistLedgerStore`]: the ledger as a file in a GitHub Gist
//! - [`FileLedgerStore`]: the ledger as a local `.metta` file
//! - [`InMemoryLedgerStore`]: process-local, for tests and demos

pub mod file_backend;
pub mod gist;
pub mod grammar;
pub mod in_memory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use echonet_config::{LedgerBackend, LedgerConfig};
use echonet_core::error::LedgerError;
use echonet_core::ledger::LedgerStore;

pub use file_backend::FileLedgerStore;
pub use gist::GistLedgerStore;
pub use grammar::{
    ParsedLedger, ParsedLine, encode_comment, encode_event, encode_location, parse_ledger,
    parse_line,
};
pub use in_memory::InMemoryLedgerStore;

/// The header every freshly initialized ledger starts with.
pub const LEDGER_HEADER: &str = "; EchoNet Shared Knowledge Graph\n; Managed by the Notary Agent.\n";

/// Build the configured ledger store.
pub fn open_store(config: &LedgerConfig) -> Result<Arc<dyn LedgerStore>, LedgerError> {
    let store: Arc<dyn LedgerStore> = match config.backend {
        LedgerBackend::Gist => {
            let gist_id = config.gist_id.clone().ok_or_else(|| {
                LedgerError::Format("no gist id configured for the gist backend".into())
            })?;
            let store = GistLedgerStore::new(
                gist_id,
                &config.file_name,
                config.token.clone(),
                Duration::from_secs(config.timeout_secs),
            )?
            .with_api_url(&config.api_url)
            .with_raw_url(&config.raw_url);
            Arc::new(store)
        }
        LedgerBackend::File => Arc::new(FileLedgerStore::new(PathBuf::from(&config.path))),
        LedgerBackend::Memory => Arc::new(InMemoryLedgerStore::new()),
    };
    tracing::debug!(backend = store.name(), "Ledger store opened");
    Ok(store)
}
