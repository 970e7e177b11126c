//! # EchoNet Notary
//!
//! The notary is the only component allowed to write the shared ledger. It
//! turns sensor facts into atoms, deduplicates location definitions, and
//! assigns monotonically increasing event ids.
//!
//! ```text
//! FactSubmission ──► registry lookup ──► compose atoms ──► fetch + append + replace
//!                                              │
//!                                        WriterState
//!                               (written locations, event counter)
//! ```
//!
//! The writer state lives in process memory. A failed write is logged and
//! reported but never rolled back, so the ledger can fall behind the counter.

pub mod state;
pub mod writer;

pub use state::WriterState;
pub use writer::{Notary, NotaryOptions, SubmitReport, WritePolicy};
