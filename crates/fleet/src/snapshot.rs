//! Immutable ledger materialization and the aggregations over it.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use echonet_core::fact::{AggregateStat, LocationRecord, NoiseEvent};
use echonet_ledger::ParsedLedger;

/// Summary text when no location has been seen.
pub const NO_DATA_SUMMARY: &str = "No data available.";

const NIGHT_START_HOUR: u32 = 22;
const NIGHT_END_HOUR: u32 = 6;

/// One parsed view of the ledger, replaced wholesale on every successful poll.
#[derive(Debug, Clone, Default)]
pub struct ReaderSnapshot {
    locations: Vec<LocationRecord>,
    index: HashMap<String, usize>,
    events: Vec<NoiseEvent>,
    fetched_at: Option<DateTime<Utc>>,
    skipped_lines: usize,
}

impl ReaderSnapshot {
    /// The snapshot served before the first successful poll.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a parsed ledger. The first definition of a location id
    /// wins; later duplicates are ignored.
    pub fn from_ledger(parsed: ParsedLedger, fetched_at: DateTime<Utc>) -> Self {
        let mut locations = Vec::with_capacity(parsed.locations.len());
        let mut index = HashMap::with_capacity(parsed.locations.len());
        for location in parsed.locations {
            if index.contains_key(&location.location_id) {
                continue;
            }
            index.insert(location.location_id.clone(), locations.len());
            locations.push(location);
        }
        Self {
            locations,
            index,
            events: parsed.events,
            fetched_at: Some(fetched_at),
            skipped_lines: parsed.skipped,
        }
    }

    /// Locations in ledger order.
    pub fn locations(&self) -> &[LocationRecord] {
        &self.locations
    }

    pub fn location(&self, location_id: &str) -> Option<&LocationRecord> {
        self.index.get(location_id).map(|&i| &self.locations[i])
    }

    pub fn events(&self) -> &[NoiseEvent] {
        &self.events
    }

    /// When the ledger behind this snapshot was fetched. `None` until the
    /// first successful poll.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Mean decibel level for a location.
    ///
    /// With `night_only`, only events whose written time of day falls in
    /// `[22:00, 06:00)` count, and events with unreadable timestamps are
    /// dropped. Returns `None` when nothing qualifies.
    pub fn average_db(&self, location_id: &str, night_only: bool) -> Option<f64> {
        let (sum, count) = self
            .events
            .iter()
            .filter(|ev| ev.location_id == location_id)
            .filter(|ev| !night_only || is_night(&ev.timestamp).unwrap_or(false))
            .fold((0.0, 0usize), |(sum, count), ev| (sum + ev.decibel, count + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Overall and night averages for every known location, in ledger order.
    pub fn aggregate_stats(&self) -> Vec<AggregateStat> {
        self.locations
            .iter()
            .map(|loc| AggregateStat {
                location_id: loc.location_id.clone(),
                overall_average_db: self.average_db(&loc.location_id, false),
                night_average_db: self.average_db(&loc.location_id, true),
            })
            .collect()
    }

    /// The text handed to the generation provider as retrieved facts.
    pub fn facts_summary(&self) -> String {
        if self.locations.is_empty() {
            return NO_DATA_SUMMARY.to_string();
        }
        let mut lines = vec!["Facts about the noise environment:".to_string()];
        for (loc, stat) in self.locations.iter().zip(self.aggregate_stats()) {
            lines.push(format!(
                "- '{}' (ID: {}) avg: {}, night avg: {}",
                loc.name,
                loc.location_id,
                db_label(stat.overall_average_db),
                db_label(stat.night_average_db),
            ));
        }
        lines.join("\n")
    }
}

fn db_label(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1} dB"),
        None => "No data".to_string(),
    }
}

/// Whether a ledger timestamp falls in the night window.
///
/// The time of day is taken as written (an explicit offset is not converted
/// to UTC). `None` when the timestamp cannot be read.
pub fn is_night(timestamp: &str) -> Option<bool> {
    let time = time_of_day(timestamp)?;
    Some(time.hour() >= NIGHT_START_HOUR || time.hour() < NIGHT_END_HOUR)
}

fn time_of_day(timestamp: &str) -> Option<NaiveTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt.time());
    }
    let naive = timestamp.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.time())
}
