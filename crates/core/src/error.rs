//! Error types for the EchoNet domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Failures talking to the remote ledger resource.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Unreachable, timed out, or answered with a non-success status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote document lacks the structure we expect (e.g. the ledger file).
    #[error("Format error: {0}")]
    Format(String),

    /// A conditional replace lost the race against another writer.
    #[error("Ledger changed since it was read (expected version {expected}, found {found})")]
    Conflict { expected: String, found: String },

    /// The store has no conditional-write primitive.
    #[error("Operation not supported by ledger store '{0}'")]
    Unsupported(String),
}

/// Reasons the notary discards an inbound fact.
///
/// None of these are fatal: the fact is dropped and the ledger is untouched.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    #[error("Unknown device {mac_address}: not in sensor registry, fact discarded")]
    UnknownDevice { mac_address: String },

    #[error("Invalid reading from {mac_address}: {reason}")]
    InvalidReading { mac_address: String, reason: String },

    #[error("Invalid timestamp {timestamp} from {mac_address}")]
    InvalidTimestamp { mac_address: String, timestamp: f64 },

    /// The event counter cannot advance without wrapping.
    #[error("Event ids exhausted after {last_event_id}, fact discarded")]
    EventIdsExhausted { last_event_id: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_displays_correctly() {
        let err = LedgerError::Transport("status 502".into());
        assert!(err.to_string().contains("Transport"));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn unknown_device_names_the_mac() {
        let err = SubmitError::UnknownDevice {
            mac_address: "AA:BB".into(),
        };
        assert!(err.to_string().contains("AA:BB"));
        assert!(err.to_string().contains("discarded"));
    }

    #[test]
    fn exhausted_ids_name_the_last_id() {
        let err = SubmitError::EventIdsExhausted {
            last_event_id: "N18446744073709551615".into(),
        };
        assert!(err.to_string().contains("N18446744073709551615"));
    }

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }
}
