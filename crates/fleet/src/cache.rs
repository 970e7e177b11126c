//! The reader cache: current snapshot, refresh, and the background poller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use echonet_core::error::LedgerError;
use echonet_core::event::{DomainEvent, EventBus};
use echonet_core::ledger::LedgerStore;
use echonet_ledger::parse_ledger;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::snapshot::ReaderSnapshot;

/// Outcome of one poll.
#[derive(Debug, Clone)]
pub enum RefreshReport {
    Synced {
        locations: usize,
        events: usize,
        skipped_lines: usize,
    },
    /// The previous snapshot is still being served.
    Failed {
        error: LedgerError,
        consecutive_failures: u32,
    },
}

impl RefreshReport {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Point-in-time health of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct FleetStatus {
    pub store: String,
    pub locations: usize,
    pub events: usize,
    pub skipped_lines: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct SyncHealth {
    last_error: Option<String>,
    consecutive_failures: u32,
}

/// Holds the current [`ReaderSnapshot`] and keeps it fresh.
pub struct FleetManager {
    store: Arc<dyn LedgerStore>,
    snapshot: RwLock<Arc<ReaderSnapshot>>,
    health: RwLock<SyncHealth>,
    /// Serializes refreshes so two polls never race on the swap
    refresh_gate: Mutex<()>,
    event_bus: Arc<EventBus>,
}

impl FleetManager {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(ReaderSnapshot::empty())),
            health: RwLock::new(SyncHealth::default()),
            refresh_gate: Mutex::new(()),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// The snapshot currently in service. Cheap: clones an `Arc`.
    pub async fn snapshot(&self) -> Arc<ReaderSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Fetch the ledger and swap in a fresh snapshot.
    ///
    /// Failures are absorbed: the old snapshot stays, the error is logged,
    /// published, and returned in the report.
    pub async fn refresh(&self) -> RefreshReport {
        let _gate = self.refresh_gate.lock().await;
        debug!(store = self.store.name(), "Syncing ledger");

        let content = match self.store.fetch().await {
            Ok(content) => content,
            Err(error) => return self.record_failure(error).await,
        };

        let parsed = parse_ledger(&content);
        let fresh = Arc::new(ReaderSnapshot::from_ledger(parsed, Utc::now()));
        let locations = fresh.locations().len();
        let events = fresh.events().len();
        let skipped_lines = fresh.skipped_lines();

        *self.snapshot.write().await = fresh;
        *self.health.write().await = SyncHealth::default();

        info!(locations, events, skipped_lines, "Ledger synced");
        self.event_bus.publish(DomainEvent::LedgerSynced {
            locations,
            events,
            skipped_lines,
            timestamp: Utc::now(),
        });
        RefreshReport::Synced {
            locations,
            events,
            skipped_lines,
        }
    }

    async fn record_failure(&self, error: LedgerError) -> RefreshReport {
        let consecutive_failures = {
            let mut health = self.health.write().await;
            health.consecutive_failures += 1;
            health.last_error = Some(error.to_string());
            health.consecutive_failures
        };
        warn!(
            error = %error,
            consecutive_failures,
            "Ledger sync failed, serving previous snapshot"
        );
        self.event_bus.publish(DomainEvent::LedgerSyncFailed {
            error_message: error.to_string(),
            consecutive_failures,
            timestamp: Utc::now(),
        });
        RefreshReport::Failed {
            error,
            consecutive_failures,
        }
    }

    pub async fn status(&self) -> FleetStatus {
        let snapshot = self.snapshot().await;
        let health = self.health.read().await;
        FleetStatus {
            store: self.store.name().to_string(),
            locations: snapshot.locations().len(),
            events: snapshot.events().len(),
            skipped_lines: snapshot.skipped_lines(),
            fetched_at: snapshot.fetched_at(),
            last_error: health.last_error.clone(),
            consecutive_failures: health.consecutive_failures,
        }
    }

    /// Refresh now, then every `period` until the handle is aborted.
    ///
    /// Ticks missed while a slow refresh runs are skipped, not queued.
    pub fn spawn_poller(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let fleet = Arc::clone(self);
        let period = period.max(Duration::from_millis(1));
        info!(period_secs = period.as_secs(), "Starting ledger poller");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                fleet.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use echonet_ledger::InMemoryLedgerStore;
    use tokio::sync::Notify;

    /// Parks every fetch until the test releases it.
    struct GatedStore {
        inner: InMemoryLedgerStore,
        entered: Notify,
        release: Notify,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl LedgerStore for GatedStore {
        fn name(&self) -> &str {
            "gated"
        }

        async fn fetch(&self) -> Result<String, LedgerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.fetch().await
        }

        async fn replace(&self, content: &str) -> Result<(), LedgerError> {
            self.inner.replace(content).await
        }
    }

    const PARK: &str = concat!(
        "(location LOC001 \"Central Park\" 40.7829 -73.9654)\n",
        "(noise_event N001 LOC001 \"2024-01-01T12:00:00+00:00\" 60.0)\n",
    );

    fn fleet_over(store: &Arc<InMemoryLedgerStore>) -> FleetManager {
        FleetManager::new(store.clone())
    }

    #[tokio::test]
    async fn serves_empty_snapshot_before_first_sync() {
        let store = Arc::new(InMemoryLedgerStore::with_content(PARK));
        let fleet = fleet_over(&store);
        let snap = fleet.snapshot().await;
        assert!(snap.locations().is_empty());
        assert!(snap.fetched_at().is_none());
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn refresh_swaps_snapshot() {
        let store = Arc::new(InMemoryLedgerStore::with_content(PARK));
        let fleet = fleet_over(&store);

        let report = fleet.refresh().await;
        assert!(matches!(
            report,
            RefreshReport::Synced { locations: 1, events: 1, skipped_lines: 0 }
        ));
        assert_eq!(fleet.snapshot().await.average_db("LOC001", false), Some(60.0));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(InMemoryLedgerStore::with_content(PARK));
        let fleet = fleet_over(&store);
        let mut rx = fleet.event_bus().subscribe();

        assert!(fleet.refresh().await.is_synced());
        let before = fleet.snapshot().await;

        store.fail_fetches(true);
        for expected in 1..=2 {
            match fleet.refresh().await {
                RefreshReport::Failed { error, consecutive_failures } => {
                    assert!(matches!(error, LedgerError::Transport(_)));
                    assert_eq!(consecutive_failures, expected);
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }

        let after = fleet.snapshot().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.average_db("LOC001", false), Some(60.0));

        let status = fleet.status().await;
        assert_eq!(status.consecutive_failures, 2);
        assert!(status.last_error.is_some());
        assert_eq!(status.locations, 1);

        assert!(matches!(rx.recv().await.unwrap().as_ref(), DomainEvent::LedgerSynced { .. }));
        assert!(matches!(
            rx.recv().await.unwrap().as_ref(),
            DomainEvent::LedgerSyncFailed { consecutive_failures: 1, .. }
        ));

        store.fail_fetches(false);
        assert!(fleet.refresh().await.is_synced());
        let status = fleet.status().await;
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn held_snapshot_is_unaffected_by_swap() {
        let store = Arc::new(InMemoryLedgerStore::with_content(PARK));
        let fleet = fleet_over(&store);
        fleet.refresh().await;
        let held = fleet.snapshot().await;

        store.set_content("").await;
        fleet.refresh().await;

        assert_eq!(held.events().len(), 1);
        assert!(fleet.snapshot().await.events().is_empty());
    }

    #[tokio::test]
    async fn overlapping_refreshes_run_one_at_a_time() {
        let store = Arc::new(GatedStore {
            inner: InMemoryLedgerStore::with_content(PARK),
            entered: Notify::new(),
            release: Notify::new(),
            fetches: AtomicUsize::new(0),
        });
        let fleet = Arc::new(FleetManager::new(store.clone()));

        let first = tokio::spawn({
            let fleet = fleet.clone();
            async move { fleet.refresh().await }
        });
        store.entered.notified().await;

        let second = tokio::spawn({
            let fleet = fleet.clone();
            async move { fleet.refresh().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert!(fleet.snapshot().await.events().is_empty());

        // The second fetch only starts once the first snapshot is in place.
        store.release.notify_one();
        store.entered.notified().await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(fleet.snapshot().await.events().len(), 1);

        store.release.notify_one();
        assert!(first.await.unwrap().is_synced());
        assert!(second.await.unwrap().is_synced());
        assert_eq!(fleet.status().await.events, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_refreshes_immediately_then_periodically() {
        let store = Arc::new(InMemoryLedgerStore::with_content(PARK));
        let fleet = Arc::new(fleet_over(&store));

        let handle = fleet.spawn_poller(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(65)).await;
        handle.abort();

        // Ticks at 0s, 30s and 60s.
        assert_eq!(store.fetch_count(), 3);
        assert_eq!(fleet.status().await.events, 1);
    }
}
