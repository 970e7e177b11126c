//! # EchoNet Core
//!
//! Domain types, traits, and error definitions for the EchoNet fact ledger.
//! Apart from reading the sensor registry file it does no I/O. It defines
//! the domain model that the ledger stores, the notary (writer), and the
//! fleet manager (reader) implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator at a process boundary is a trait here:
//! - [`LedgerStore`]: the remote text resource holding the ledger
//! - [`Provider`]: the text-generation capability used to answer queries
//!
//! Implementations live in their respective crates, so tests can swap in
//! in-memory stores and scripted providers.

pub mod error;
pub mod event;
pub mod fact;
pub mod ledger;
pub mod message;
pub mod provider;
pub mod registry;

// Re-export key types at crate root for ergonomics
pub use error::{LedgerError, ProviderError, SubmitError};
pub use event::{DomainEvent, EventBus};
pub use fact::{AggregateStat, FactSubmission, LocationRecord, NoiseEvent, QueryRequest, QueryResponse};
pub use ledger::{LedgerStore, LedgerVersion};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use registry::{SensorInfo, SensorRegistry};
