//! # EchoNet Fleet Manager
//!
//! A reader of the shared ledger. It polls the store, materializes an
//! immutable [`ReaderSnapshot`], and answers questions about it:
//!
//! - [`snapshot`]: parsed locations and events plus the aggregations
//! - [`cache`]: the [`FleetManager`] holding the current snapshot and its poller
//! - [`query`]: facts summary + question handed to a generation provider
//!
//! Queries only ever read the cached snapshot. A failed poll keeps the
//! previous snapshot in service.

pub mod cache;
pub mod query;
pub mod snapshot;

pub use cache::{FleetManager, FleetStatus, RefreshReport};
pub use query::{QueryAnswerer, QueryOptions};
pub use snapshot::ReaderSnapshot;
