//! `echonet notary`: notarize facts arriving as JSON lines on stdin.

use std::path::Path;

use echonet_core::error::SubmitError;
use echonet_core::fact::FactSubmission;
use echonet_core::registry::SensorRegistry;
use echonet_notary::{Notary, NotaryOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{CliResult, load_config};

pub async fn run(config_path: Option<&Path>, resume: bool) -> CliResult {
    let config = load_config(config_path)?;

    let registry = SensorRegistry::load(Path::new(&config.notary.registry_path));
    if registry.is_empty() {
        warn!(
            path = %config.notary.registry_path,
            "Sensor registry is empty, every fact will be rejected"
        );
    }

    let store = echonet_ledger::open_store(&config.ledger)
        .map_err(|e| format!("Failed to open ledger: {e}"))?;

    let mut options = NotaryOptions::from(&config.notary);
    if resume {
        options.reset_on_start = false;
    }

    let notary = Notary::start(store, registry, options)
        .await
        .map_err(|e| format!("Failed to initialize ledger: {e}"))?;
    info!(sensors = notary.registry().len(), "Notary ready, reading facts from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut accepted, mut rejected) = (0usize, 0usize);

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fact: FactSubmission = match serde_json::from_str(line) {
            Ok(fact) => fact,
            Err(e) => {
                warn!(error = %e, "Skipping malformed fact");
                rejected += 1;
                continue;
            }
        };

        match notary.submit_fact(&fact).await {
            Ok(report) => {
                accepted += 1;
                let outcome = if report.persisted { "persisted" } else { "NOT persisted" };
                println!("{} {} {outcome}", report.event_id, report.location_id);
            }
            // Already logged by the notary
            Err(SubmitError::UnknownDevice { .. }) => rejected += 1,
            Err(e) => {
                warn!(error = %e, "Fact rejected");
                rejected += 1;
            }
        }
    }

    info!(accepted, rejected, "Input closed, notary stopping");
    Ok(())
}
