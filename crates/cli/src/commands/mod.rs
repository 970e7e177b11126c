//! Subcommand implementations and the wiring they share.

pub mod ask;
pub mod fleet;
pub mod notary;
pub mod onboard;
pub mod status;
pub mod summary;

use std::path::Path;
use std::sync::Arc;

use echonet_config::AppConfig;
use echonet_fleet::{FleetManager, QueryAnswerer, QueryOptions, RefreshReport};
use tracing::warn;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Load the config file (explicit path or the default one).
pub fn load_config(path: Option<&Path>) -> CliResult<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_file(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// Load the config without validating it, so `status` can describe what is wrong.
pub fn load_config_lenient(path: Option<&Path>) -> CliResult<AppConfig> {
    let default_path;
    let path = match path {
        Some(path) => path,
        None => {
            default_path = AppConfig::config_dir().join("config.toml");
            &default_path
        }
    };
    AppConfig::load_file_lenient(path).map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn open_fleet(config: &AppConfig) -> CliResult<Arc<FleetManager>> {
    let store = echonet_ledger::open_store(&config.ledger)
        .map_err(|e| format!("Failed to open ledger: {e}"))?;
    Ok(Arc::new(FleetManager::new(store)))
}

/// One-shot commands sync once and carry on with whatever the cache holds.
pub async fn open_synced_fleet(config: &AppConfig) -> CliResult<Arc<FleetManager>> {
    let fleet = open_fleet(config)?;
    if let RefreshReport::Failed { error, .. } = fleet.refresh().await {
        warn!(error = %error, "Could not read the ledger, answering without facts");
    }
    Ok(fleet)
}

pub fn query_answerer(config: &AppConfig, fleet: Arc<FleetManager>) -> QueryAnswerer {
    let provider = echonet_providers::build_from_config(&config.llm);
    QueryAnswerer::new(fleet, provider, QueryOptions::from(&config.llm))
}
