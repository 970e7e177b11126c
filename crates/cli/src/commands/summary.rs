//! `echonet summary`: print the facts summary or per-location statistics.

use std::path::Path;

use super::{CliResult, load_config, open_synced_fleet};

pub async fn run(config_path: Option<&Path>, json: bool) -> CliResult {
    let config = load_config(config_path)?;
    let snapshot = open_synced_fleet(&config).await?.snapshot().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot.aggregate_stats())?);
    } else {
        println!("{}", snapshot.facts_summary());
    }
    Ok(())
}
