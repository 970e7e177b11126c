//! Configuration loading, validation, and management for EchoNet.
//!
//! Loads configuration from `~/.echonet/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.echonet/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the shared ledger lives
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Writer settings
    #[serde(default)]
    pub notary: NotaryConfig,

    /// Reader settings
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Text-generation provider used to answer queries
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

/// Which store backs the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    /// A GitHub Gist (shared between machines)
    #[default]
    Gist,
    /// A local `.metta` file
    File,
    /// Process-local, lost on exit
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Gist id holding the ledger file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gist_id: Option<String>,

    /// Name of the ledger file inside the gist
    #[serde(default = "default_ledger_file_name")]
    pub file_name: String,

    /// GitHub API base URL
    #[serde(default = "default_gist_api_url")]
    pub api_url: String,

    /// Raw content host, read instead of the API when no token is set
    #[serde(default = "default_gist_raw_url")]
    pub raw_url: String,

    /// Bearer token with gist scope. The notary needs one to write; readers
    /// without one poll the raw content host, which is not API rate limited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Ledger path for the file backend
    #[serde(default = "default_ledger_path")]
    pub path: String,

    /// Bound on every fetch/replace round trip
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
}

fn default_ledger_file_name() -> String {
    "knowledge_graph.metta".into()
}
fn default_gist_api_url() -> String {
    "https://api.github.com".into()
}
fn default_gist_raw_url() -> String {
    "https://gist.githubusercontent.com".into()
}
fn default_ledger_path() -> String {
    "knowledge_graph.metta".into()
}
fn default_ledger_timeout() -> u64 {
    10
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            gist_id: None,
            file_name: default_ledger_file_name(),
            api_url: default_gist_api_url(),
            raw_url: default_gist_raw_url(),
            token: None,
            path: default_ledger_path(),
            timeout_secs: default_ledger_timeout(),
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("backend", &self.backend)
            .field("gist_id", &self.gist_id)
            .field("file_name", &self.file_name)
            .field("api_url", &self.api_url)
            .field("raw_url", &self.raw_url)
            .field("token", &redact(&self.token))
            .field("path", &self.path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotaryConfig {
    /// JSON file mapping MAC addresses to locations
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Clear the ledger to its header on startup (destroys prior history)
    #[serde(default = "default_true")]
    pub reset_on_start: bool,

    /// Use compare-and-swap writes where the store supports them
    #[serde(default)]
    pub conditional_writes: bool,

    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
}

fn default_registry_path() -> String {
    "sensor_registry.json".into()
}
fn default_max_write_attempts() -> u32 {
    3
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            reset_on_start: true,
            conditional_writes: false,
            max_write_attempts: default_max_write_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Seconds between ledger polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Overrides the provider's well-known base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Bound on a single generation call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_provider() -> String {
    "asi1".into()
}
fn default_model() -> String {
    "asi1-extended".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_url: None,
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Read the first set, non-placeholder env var among `names`.
///
/// Values containing `YOUR` (as in `YOUR_API_KEY_HERE`) count as unset.
fn env_secret(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| is_real_secret(value))
}

fn is_real_secret(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains("YOUR")
}

impl AppConfig {
    /// Load configuration from the default path (~/.echonet/config.toml).
    ///
    /// Environment overrides (highest priority first):
    /// - `ECHONET_GIST_TOKEN`, `GITHUB_PAT`
    /// - `ECHONET_GIST_ID`, `KNOWLEDGE_GRAPH_GIST_ID`
    /// - `ECHONET_LLM_API_KEY`, `ASI_API_KEY`
    /// - `ECHONET_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_file(&Self::config_dir().join("config.toml"))
    }

    /// Like [`AppConfig::load`], for an explicit file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// File plus environment overrides, without validation. For commands
    /// that report on a broken setup instead of refusing to run.
    pub fn load_file_lenient(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.drop_placeholder_secrets();
        config.validate_values()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(token) = env_secret(&["ECHONET_GIST_TOKEN", "GITHUB_PAT"]) {
            self.ledger.token = Some(token);
        }
        if let Some(gist_id) = env_secret(&["ECHONET_GIST_ID", "KNOWLEDGE_GRAPH_GIST_ID"]) {
            self.ledger.gist_id = Some(gist_id);
        }
        if let Some(key) = env_secret(&["ECHONET_LLM_API_KEY", "ASI_API_KEY"]) {
            self.llm.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("ECHONET_MODEL") {
            self.llm.model = model;
        }
    }

    fn drop_placeholder_secrets(&mut self) {
        if self.ledger.token.as_deref().is_some_and(|t| !is_real_secret(t)) {
            self.ledger.token = None;
        }
        if self.llm.api_key.as_deref().is_some_and(|k| !is_real_secret(k)) {
            self.llm.api_key = None;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".echonet")
    }

    /// Validate everything, including settings that may come from the environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_values()?;
        if self.ledger.backend == LedgerBackend::Gist && self.ledger.gist_id.is_none() {
            return Err(ConfigError::ValidationError(
                "ledger.gist_id is required for the gist backend (or set ECHONET_GIST_ID)".into(),
            ));
        }
        Ok(())
    }

    fn validate_values(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.fleet.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fleet.poll_interval_secs must be > 0".into(),
            ));
        }
        if self.ledger.timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be > 0 seconds".into(),
            ));
        }
        if self.notary.max_write_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "notary.max_write_attempts must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Check if the generation provider has credentials.
    pub fn has_llm_key(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.ledger.backend, LedgerBackend::Gist);
        assert_eq!(config.ledger.file_name, "knowledge_graph.metta");
        assert_eq!(config.ledger.timeout_secs, 10);
        assert_eq!(config.fleet.poll_interval_secs, 30);
        assert_eq!(config.llm.model, "asi1-extended");
        assert!(config.notary.reset_on_start);
        assert!(!config.notary.conditional_writes);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm.provider, config.llm.provider);
        assert_eq!(parsed.fleet.poll_interval_secs, config.fleet.poll_interval_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 5.0;
        assert!(config.validate_values().is_err());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = AppConfig::default();
        config.fleet.poll_interval_secs = 0;
        assert!(config.validate_values().is_err());
    }

    #[test]
    fn gist_backend_requires_gist_id() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ledger.gist_id = Some("abc123".into());
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.ledger.backend = LedgerBackend::File;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.llm.provider, "asi1");
    }

    #[test]
    fn load_from_file_with_sections() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
[ledger]
backend = "file"
path = "/tmp/kg.metta"

[fleet]
poll_interval_secs = 5

[llm]
api_key = "YOUR_ASI_KEY_HERE"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.ledger.backend, LedgerBackend::File);
        assert_eq!(config.ledger.path, "/tmp/kg.metta");
        assert_eq!(config.fleet.poll_interval_secs, 5);
        // Placeholder keys count as unset
        assert!(!config.has_llm_key());
    }

    #[test]
    fn load_file_validates_backend() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "[ledger]\nbackend = \"memory\"\n").unwrap();
        let config = AppConfig::load_file(tmp.path()).unwrap();
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);

        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "[fleet]\npoll_interval_secs = 0\n").unwrap();
        assert!(AppConfig::load_file(bad.path()).is_err());
    }

    #[test]
    fn lenient_load_keeps_invalid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "[ledger]\nbackend = \"gist\"\n\n[fleet]\npoll_interval_secs = 0\n").unwrap();

        assert!(AppConfig::load_file(tmp.path()).is_err());
        let config = AppConfig::load_file_lenient(tmp.path()).unwrap();
        assert_eq!(config.ledger.backend, LedgerBackend::Gist);
        assert_eq!(config.fleet.poll_interval_secs, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.ledger.token = Some("ghp_secret".into());
        config.llm.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("asi1-extended"));
        assert!(toml_str.contains("knowledge_graph.metta"));
    }
}
