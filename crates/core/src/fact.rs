//! Fact domain types: the records that flow through the ledger.
//!
//! Sensor reading → [`FactSubmission`] → notary writes [`LocationRecord`] and
//! [`NoiseEvent`] atoms → fleet manager parses them back → [`AggregateStat`].

use serde::{Deserialize, Serialize};

/// Prefix of every noise event identifier (`N001`, `N002`, ...).
pub const EVENT_ID_PREFIX: char = 'N';

/// A physical place a sensor is mounted at.
///
/// Written once by the notary the first time a sensor mapped to the location
/// reports; its attributes never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub location_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A single timestamped sound-level reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseEvent {
    /// `N` + zero-padded sequence number, strictly increasing in ledger order
    pub event_id: String,

    /// Must reference a location defined earlier in the ledger
    pub location_id: String,

    /// ISO-8601, UTC, second precision
    pub timestamp: String,

    /// Sound pressure level in dB
    pub decibel: f64,
}

/// Format the event id for the `n`-th event: `N001`, ..., `N999`, `N1000`.
pub fn format_event_id(n: u64) -> String {
    format!("{EVENT_ID_PREFIX}{n:03}")
}

/// Recover the sequence number from an event id, if it has the `N<digits>` shape.
pub fn event_sequence(event_id: &str) -> Option<u64> {
    let digits = event_id.strip_prefix(EVENT_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A validated sensor reading delivered to the notary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSubmission {
    pub mac_address: String,
    pub sound_level_db: f64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

/// Derived per-location statistics; computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub location_id: String,
    pub overall_average_db: Option<f64>,
    pub night_average_db: Option<f64>,
}

/// A natural-language question for the fleet manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// The fleet manager's answer. Always a string, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_zero_padded() {
        assert_eq!(format_event_id(1), "N001");
        assert_eq!(format_event_id(42), "N042");
        assert_eq!(format_event_id(999), "N999");
        assert_eq!(format_event_id(1000), "N1000");
    }

    #[test]
    fn event_sequence_parses_only_well_formed_ids() {
        assert_eq!(event_sequence("N001"), Some(1));
        assert_eq!(event_sequence("N1234"), Some(1234));
        assert_eq!(event_sequence("N"), None);
        assert_eq!(event_sequence("E001"), None);
        assert_eq!(event_sequence("N-01"), None);
    }

    #[test]
    fn fact_submission_deserializes_from_inbound_json() {
        let json = r#"{"mac_address":"AA:BB","sound_level_db":50.5,"timestamp":1704150000}"#;
        let fact: FactSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(fact.mac_address, "AA:BB");
        assert!((fact.sound_level_db - 50.5).abs() < f64::EPSILON);
        assert!((fact.timestamp - 1_704_150_000.0).abs() < f64::EPSILON);
    }
}
