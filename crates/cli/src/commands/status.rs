//! `echonet status`: show configuration and ledger health.

use std::path::Path;

use echonet_config::{AppConfig, LedgerBackend};
use echonet_core::provider::Provider;

use echonet_fleet::FleetManager;

use super::{CliResult, load_config_lenient};

pub async fn run(config_path: Option<&Path>) -> CliResult {
    let config = load_config_lenient(config_path)?;

    println!("EchoNet Status");
    println!("==============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    match config.ledger.backend {
        LedgerBackend::Gist => println!(
            "  Ledger:         gist {} ({})",
            config.ledger.gist_id.as_deref().unwrap_or("-"),
            config.ledger.file_name
        ),
        LedgerBackend::File => println!("  Ledger:         file {}", config.ledger.path),
        LedgerBackend::Memory => println!("  Ledger:         in-memory"),
    }
    println!(
        "  Ledger token:   {}",
        if config.ledger.token.is_some() { "set" } else { "not set" }
    );
    println!("  Registry:       {}", config.notary.registry_path);
    println!(
        "  On start:       {}",
        if config.notary.reset_on_start { "reset ledger" } else { "resume" }
    );
    println!(
        "  Writes:         {}",
        if config.notary.conditional_writes { "conditional" } else { "last-writer-wins" }
    );
    println!("  Poll interval:  {}s", config.fleet.poll_interval_secs);
    println!("  LLM provider:   {}", config.llm.provider);
    println!("  Model:          {}", config.llm.model);
    println!(
        "  LLM key:        {}",
        if config.has_llm_key() { "set" } else { "not set" }
    );

    println!();
    if let Err(e) = config.validate() {
        println!("  ⚠️  Config problem: {e}");
    }

    match echonet_ledger::open_store(&config.ledger) {
        Ok(store) => {
            let fleet = FleetManager::new(store);
            let report = fleet.refresh().await;
            let status = fleet.status().await;
            if report.is_synced() {
                println!("  ✅ Ledger reachable ({})", status.store);
                println!("     Locations:     {}", status.locations);
                println!("     Events:        {}", status.events);
                println!("     Skipped lines: {}", status.skipped_lines);
            } else {
                println!(
                    "  ⚠️  Ledger unreachable: {}",
                    status.last_error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Err(e) => println!("  ⚠️  Ledger not opened: {e}"),
    }

    match echonet_providers::build_from_config(&config.llm) {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ LLM endpoint reachable ({})", provider.name()),
            Ok(false) => println!("  ⚠️  LLM endpoint answered with an error ({})", provider.name()),
            Err(e) => println!("  ⚠️  LLM endpoint unreachable: {e}"),
        },
        None => println!("  ⚠️  No LLM key, queries will report that the model is not configured"),
    }

    Ok(())
}
