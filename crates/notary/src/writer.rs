//! The notary: registry lookup, atom composition, and the ledger write cycle.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use echonet_config::NotaryConfig;
use echonet_core::error::{LedgerError, SubmitError};
use echonet_core::event::{DomainEvent, EventBus};
use echonet_core::fact::{FactSubmission, NoiseEvent};
use echonet_core::ledger::LedgerStore;
use echonet_core::registry::SensorRegistry;
use echonet_ledger::{LEDGER_HEADER, encode_comment, encode_event, encode_location, parse_ledger};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::state::WriterState;

/// How the append step reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Fetch, append, overwrite. A concurrent writer's atoms can be lost.
    #[default]
    LastWriterWins,
    /// Compare-and-swap on the fetched version, retrying on conflict.
    Conditional { max_attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotaryOptions {
    /// Clear the ledger to its header on start instead of resuming from it
    pub reset_on_start: bool,
    pub write_policy: WritePolicy,
}

impl Default for NotaryOptions {
    fn default() -> Self {
        Self {
            reset_on_start: true,
            write_policy: WritePolicy::LastWriterWins,
        }
    }
}

impl From<&NotaryConfig> for NotaryOptions {
    fn from(config: &NotaryConfig) -> Self {
        let write_policy = if config.conditional_writes {
            WritePolicy::Conditional {
                max_attempts: config.max_write_attempts.max(1),
            }
        } else {
            WritePolicy::LastWriterWins
        };
        Self {
            reset_on_start: config.reset_on_start,
            write_policy,
        }
    }
}

/// Outcome of one accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub event_id: String,
    pub location_id: String,
    /// A location definition was written along with the event
    pub new_location: bool,
    /// `false` when the ledger write failed. The id is still consumed.
    pub persisted: bool,
}

/// The single writer of the shared ledger.
pub struct Notary {
    store: Arc<dyn LedgerStore>,
    registry: SensorRegistry,
    state: Mutex<WriterState>,
    policy: WritePolicy,
    event_bus: Arc<EventBus>,
}

impl Notary {
    /// Build a notary with empty state. Nothing touches the store until
    /// [`Notary::initialize`].
    pub fn new(store: Arc<dyn LedgerStore>, registry: SensorRegistry, policy: WritePolicy) -> Self {
        Self {
            store,
            registry,
            state: Mutex::new(WriterState::new()),
            policy,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Build and initialize in one step.
    pub async fn start(
        store: Arc<dyn LedgerStore>,
        registry: SensorRegistry,
        options: NotaryOptions,
    ) -> Result<Self, LedgerError> {
        let notary = Self::new(store, registry, options.write_policy);
        notary.initialize(options.reset_on_start).await?;
        Ok(notary)
    }

    /// Reset the ledger to its header, or resume from what it already holds.
    pub async fn initialize(&self, reset: bool) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;

        if reset {
            warn!(store = self.store.name(), "Resetting ledger, prior history is discarded");
            self.store.replace(LEDGER_HEADER).await?;
            *state = WriterState::new();
            info!("Ledger initialized");
            return Ok(());
        }

        let content = self.store.fetch().await?;
        if content.trim().is_empty() {
            self.store.replace(LEDGER_HEADER).await?;
            *state = WriterState::new();
            info!("Ledger was empty, wrote header");
            return Ok(());
        }

        let parsed = parse_ledger(&content);
        *state = WriterState::from_ledger(&parsed);
        info!(
            locations = state.written_locations().len(),
            last_event = state.event_counter(),
            skipped = parsed.skipped,
            "Resumed from existing ledger"
        );
        Ok(())
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Snapshot of the writer state.
    pub async fn state(&self) -> WriterState {
        self.state.lock().await.clone()
    }

    /// Append one fact to the ledger.
    ///
    /// Rejections leave both the ledger and the writer state untouched. A
    /// failed write is not an error here: the report says `persisted: false`
    /// and the consumed id and location mark stay in memory.
    pub async fn submit_fact(&self, fact: &FactSubmission) -> Result<SubmitReport, SubmitError> {
        let Some(sensor) = self.registry.get(&fact.mac_address) else {
            warn!(mac = %fact.mac_address, "Fact from unknown device discarded");
            self.event_bus.publish(DomainEvent::UnknownDevice {
                mac_address: fact.mac_address.clone(),
                timestamp: Utc::now(),
            });
            return Err(SubmitError::UnknownDevice {
                mac_address: fact.mac_address.clone(),
            });
        };

        if !fact.sound_level_db.is_finite() {
            return Err(SubmitError::InvalidReading {
                mac_address: fact.mac_address.clone(),
                reason: format!("sound level {} is not a finite number", fact.sound_level_db),
            });
        }
        let timestamp = iso_timestamp(fact.timestamp).ok_or_else(|| SubmitError::InvalidTimestamp {
            mac_address: fact.mac_address.clone(),
            timestamp: fact.timestamp,
        })?;

        let location = sensor.location();
        let mut state = self.state.lock().await;

        let Some(event_id) = state.next_event_id() else {
            let last_event_id = state.last_event_id().unwrap_or_default();
            error!(last_event_id = %last_event_id, "Event ids exhausted, fact discarded");
            return Err(SubmitError::EventIdsExhausted { last_event_id });
        };

        let mut new_atoms = String::new();
        let new_location = state.mark_written(&location.location_id);
        if new_location {
            new_atoms.push('\n');
            new_atoms.push_str(&encode_comment(&format!(
                "--- Location Definition: {} ---",
                location.name
            )));
            new_atoms.push('\n');
            new_atoms.push_str(&encode_location(&location));
            new_atoms.push('\n');
            self.event_bus.publish(DomainEvent::LocationRegistered {
                location_id: location.location_id.clone(),
                timestamp: Utc::now(),
            });
        }

        let event = NoiseEvent {
            event_id,
            location_id: location.location_id.clone(),
            timestamp,
            decibel: fact.sound_level_db,
        };
        new_atoms.push_str(&encode_event(&event));
        new_atoms.push('\n');

        let persisted = match self.append(&new_atoms).await {
            Ok(()) => {
                info!(
                    event_id = %event.event_id,
                    location_id = %event.location_id,
                    new_location,
                    "Fact notarized"
                );
                true
            }
            Err(e) => {
                error!(
                    event_id = %event.event_id,
                    error = %e,
                    "Ledger write failed, writer state kept"
                );
                self.event_bus.publish(DomainEvent::LedgerWriteFailed {
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                false
            }
        };
        drop(state);

        self.event_bus.publish(DomainEvent::FactAppended {
            event_id: event.event_id.clone(),
            location_id: event.location_id.clone(),
            persisted,
            timestamp: Utc::now(),
        });

        Ok(SubmitReport {
            event_id: event.event_id,
            location_id: event.location_id,
            new_location,
            persisted,
        })
    }

    async fn append(&self, new_atoms: &str) -> Result<(), LedgerError> {
        match self.policy {
            WritePolicy::LastWriterWins => {
                let current = self.store.fetch().await?;
                self.store.replace(&merge(&current, new_atoms)).await
            }
            WritePolicy::Conditional { max_attempts } => {
                let mut last_conflict = None;
                for attempt in 1..=max_attempts.max(1) {
                    let (current, version) = self.store.fetch_versioned().await?;
                    let merged = merge(&current, new_atoms);
                    match self.store.replace_if(&version, &merged).await {
                        Ok(()) => return Ok(()),
                        Err(conflict @ LedgerError::Conflict { .. }) => {
                            debug!(attempt, max_attempts, "Ledger changed underneath, retrying");
                            last_conflict = Some(conflict);
                        }
                        Err(LedgerError::Unsupported(store)) => {
                            warn!(
                                store = %store,
                                "Conditional writes unsupported, falling back to last-writer-wins"
                            );
                            return self.store.replace(&merged).await;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(last_conflict.unwrap_or_else(|| {
                    LedgerError::Transport("no write attempt was made".into())
                }))
            }
        }
    }
}

fn merge(current: &str, new_atoms: &str) -> String {
    let mut merged = String::with_capacity(current.len() + new_atoms.len());
    merged.push_str(current);
    merged.push_str(new_atoms);
    merged
}

/// Epoch seconds to `YYYY-MM-DDTHH:MM:SS+00:00`, dropping sub-second precision.
fn iso_timestamp(epoch_secs: f64) -> Option<String> {
    if !epoch_secs.is_finite() {
        return None;
    }
    let secs = epoch_secs.floor();
    if secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
}
