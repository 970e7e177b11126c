//! `echonet onboard`: First-time setup.

use echonet_config::AppConfig;

const EXAMPLE_REGISTRY: &str = r#"{
  "AA:BB:CC:DD:EE:01": {
    "loc_id": "LOC001",
    "name": "Central Park",
    "latitude": 40.7829,
    "longitude": -73.9654
  }
}
"#;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let registry_path = config_dir.join("sensor_registry.example.json");

    println!("EchoNet: First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !registry_path.exists() {
        std::fs::write(&registry_path, EXAMPLE_REGISTRY)?;
        println!("✅ Created example sensor registry: {}", registry_path.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set ledger.gist_id and ledger.token (or ECHONET_GIST_ID / ECHONET_GIST_TOKEN)");
    println!("   2. Set llm.api_key (or ECHONET_LLM_API_KEY)");
    println!("   3. Point notary.registry_path at your sensor registry");
    println!("   4. Run: echonet notary   and, elsewhere,   echonet fleet\n");

    Ok(())
}
