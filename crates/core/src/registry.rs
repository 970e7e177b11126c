//! Sensor registry: maps device MAC addresses to the location they report for.
//!
//! Supplied out of band as a JSON file:
//!
//! ```json
//! { "AA:BB": { "loc_id": "LOC001", "name": "Park", "latitude": 1.0, "longitude": 2.0 } }
//! ```
//!
//! Read-only to the ledger core. A missing entry means the fact is discarded.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fact::LocationRecord;

/// Registry entry for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub loc_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Anything else the registration frontend stored (owner, model, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SensorInfo {
    /// The location atom this device's readings are attributed to.
    pub fn location(&self) -> LocationRecord {
        LocationRecord {
            location_id: self.loc_id.clone(),
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// MAC address → sensor info.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorRegistry {
    devices: HashMap<String, SensorInfo>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry from a JSON file.
    ///
    /// A missing or unparseable file yields an empty registry with a warning:
    /// the notary still runs, it just discards every fact.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Sensor registry not found, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(registry) => {
                info!(path = %path.display(), devices = registry.len(), "Sensor registry loaded");
                registry
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Sensor registry is invalid, starting empty");
                Self::default()
            }
        }
    }

    /// Register (or replace) a device.
    pub fn insert(&mut self, mac_address: impl Into<String>, info: SensorInfo) {
        self.devices.insert(mac_address.into(), info);
    }

    pub fn get(&self, mac_address: &str) -> Option<&SensorInfo> {
        self.devices.get(mac_address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
