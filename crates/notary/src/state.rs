//! Writer-side bookkeeping.

use std::collections::HashSet;

use echonet_core::fact::{event_sequence, format_event_id};
use echonet_ledger::ParsedLedger;

/// What the notary remembers between submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterState {
    written_locations: HashSet<String>,
    event_counter: u64,
}

impl WriterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from an existing ledger.
    ///
    /// The counter resumes after the highest `N<digits>` id present; ids that
    /// do not follow the scheme are ignored.
    pub fn from_ledger(ledger: &ParsedLedger) -> Self {
        let written_locations = ledger
            .locations
            .iter()
            .map(|loc| loc.location_id.clone())
            .collect();
        let event_counter = ledger
            .events
            .iter()
            .filter_map(|ev| event_sequence(&ev.event_id))
            .max()
            .unwrap_or(0);
        Self {
            written_locations,
            event_counter,
        }
    }

    pub fn is_written(&self, location_id: &str) -> bool {
        self.written_locations.contains(location_id)
    }

    /// Record a location as defined. Returns `true` the first time.
    pub fn mark_written(&mut self, location_id: &str) -> bool {
        self.written_locations.insert(location_id.to_string())
    }

    /// Advance the counter and return the new event id.
    ///
    /// `None` once the counter is at `u64::MAX`; the counter is left as is so
    /// an id is never reused.
    pub fn next_event_id(&mut self) -> Option<String> {
        self.event_counter = self.event_counter.checked_add(1)?;
        Some(format_event_id(self.event_counter))
    }

    /// The most recently assigned id, if any.
    pub fn last_event_id(&self) -> Option<String> {
        (self.event_counter > 0).then(|| format_event_id(self.event_counter))
    }

    pub fn event_counter(&self) -> u64 {
        self.event_counter
    }

    pub fn written_locations(&self) -> &HashSet<String> {
        &self.written_locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echonet_ledger::parse_ledger;

    #[test]
    fn ids_are_sequential() {
        let mut state = WriterState::new();
        assert_eq!(state.last_event_id(), None);
        assert_eq!(state.next_event_id().as_deref(), Some("N001"));
        assert_eq!(state.next_event_id().as_deref(), Some("N002"));
        assert_eq!(state.event_counter(), 2);
        assert_eq!(state.last_event_id().as_deref(), Some("N002"));
    }

    #[test]
    fn mark_written_once() {
        let mut state = WriterState::new();
        assert!(state.mark_written("LOC001"));
        assert!(!state.mark_written("LOC001"));
        assert!(state.is_written("LOC001"));
        assert!(!state.is_written("LOC002"));
    }

    #[test]
    fn rebuild_from_ledger() {
        let ledger = parse_ledger(concat!(
            "; EchoNet Shared Knowledge Graph\n",
            "(location LOC001 \"Park\" 1.0 2.0)\n",
            "(noise_event N007 LOC001 \"2024-01-01T12:00:00+00:00\" 60.0)\n",
            "(noise_event N012 LOC001 \"2024-01-01T13:00:00+00:00\" 61.0)\n",
            "(noise_event X999 LOC001 \"2024-01-01T14:00:00+00:00\" 62.0)\n",
        ));
        let mut state = WriterState::from_ledger(&ledger);
        assert!(state.is_written("LOC001"));
        assert_eq!(state.event_counter(), 12);
        assert_eq!(state.next_event_id().as_deref(), Some("N013"));
    }

    #[test]
    fn counter_stops_at_max_instead_of_wrapping() {
        let ledger = parse_ledger(
            "(noise_event N18446744073709551615 L1 \"2024-01-01T12:00:00+00:00\" 60.0)\n",
        );
        let mut state = WriterState::from_ledger(&ledger);
        assert_eq!(state.event_counter(), u64::MAX);

        assert_eq!(state.next_event_id(), None);
        assert_eq!(state.next_event_id(), None);
        assert_eq!(state.event_counter(), u64::MAX);
    }

    #[test]
    fn rebuild_from_empty_ledger() {
        let state = WriterState::from_ledger(&parse_ledger(""));
        assert_eq!(state, WriterState::new());
    }
}
