//! Provider selection: builds the configured generation provider.

use std::sync::Arc;
use std::time::Duration;

use echonet_config::LlmConfig;
use echonet_core::provider::Provider;
use tracing::{info, warn};

use crate::openai_compat::OpenAiCompatProvider;

/// Build the generation provider from configuration.
///
/// Returns `None` when no API key is configured (local endpoints such as
/// Ollama need none). Query answering treats that as "not configured".
pub fn build_from_config(config: &LlmConfig) -> Option<Arc<dyn Provider>> {
    let needs_key = !matches!(config.provider.as_str(), "ollama" | "vllm" | "llamacpp");
    let api_key = match (&config.api_key, needs_key) {
        (Some(key), _) => key.clone(),
        (None, false) => config.provider.clone(),
        (None, true) => {
            warn!(provider = %config.provider, "No API key configured, LLM answers disabled");
            return None;
        }
    };

    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    info!(provider = %config.provider, base_url = %base_url, model = %config.model, "Generation provider configured");
    let provider = OpenAiCompatProvider::new(&config.provider, base_url, api_key)
        .with_timeout(Duration::from_secs(config.timeout_secs));
    Some(Arc::new(provider))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "asi1" | "asi" => "https://api.asi1.ai/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
