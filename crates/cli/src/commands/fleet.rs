//! `echonet fleet`: poll the ledger and answer questions from stdin.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::{CliResult, load_config, open_fleet, query_answerer};

pub async fn run(config_path: Option<&Path>) -> CliResult {
    let config = load_config(config_path)?;
    let fleet = open_fleet(&config)?;
    let poller = fleet.spawn_poller(Duration::from_secs(config.fleet.poll_interval_secs));
    let answerer = query_answerer(&config, fleet.clone());

    println!();
    println!("  EchoNet Fleet Manager");
    println!("  Ledger:    {:?}", config.ledger.backend);
    println!("  Polling:   every {}s", config.fleet.poll_interval_secs);
    println!(
        "  Model:     {} ({})",
        config.llm.model,
        if answerer.is_configured() { "configured" } else { "not configured" }
    );
    println!();
    println!("  Ask about the noise environment and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    print!("  You > ");
    std::io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if matches!(query, "exit" | "quit") {
            break;
        }
        if !query.is_empty() {
            let answer = answerer.answer(query).await;
            println!();
            for line in answer.lines() {
                println!("  Fleet > {line}");
            }
            println!();
        }
        print!("  You > ");
        std::io::stdout().flush()?;
    }

    poller.abort();
    println!();
    Ok(())
}
