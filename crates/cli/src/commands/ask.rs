//! `echonet ask`: answer one question and exit.

use std::path::Path;

use super::{CliResult, load_config, open_synced_fleet, query_answerer};

pub async fn run(config_path: Option<&Path>, query: &str) -> CliResult {
    let config = load_config(config_path)?;
    let fleet = open_synced_fleet(&config).await?;
    let answer = query_answerer(&config, fleet).answer(query).await;
    println!("{answer}");
    Ok(())
}
