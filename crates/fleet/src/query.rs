//! Retrieval-augmented query answering over the cached snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use echonet_config::LlmConfig;
use echonet_core::event::DomainEvent;
use echonet_core::fact::{QueryRequest, QueryResponse};
use echonet_core::message::Message;
use echonet_core::provider::{Provider, ProviderRequest};
use tracing::{debug, info, warn};

use crate::cache::FleetManager;

pub const NOT_CONFIGURED_ANSWER: &str =
    "LLM not configured (no API key for the generation provider).";
pub const EMPTY_ANSWER: &str = "LLM returned an empty answer.";

const INSTRUCTION: &str = "You are the EchoNet Fleet Manager, the assistant of an urban noise \
monitoring network. Answer the user's query based ONLY on the facts below. If the facts are not \
sufficient to answer, say so plainly.";

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for QueryOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Answers natural-language questions from the fleet's current facts.
///
/// [`QueryAnswerer::answer`] never fails: every problem becomes an
/// explanatory answer string.
pub struct QueryAnswerer {
    fleet: Arc<FleetManager>,
    provider: Option<Arc<dyn Provider>>,
    options: QueryOptions,
}

impl QueryAnswerer {
    /// `provider` is `None` when no generation backend is configured.
    pub fn new(
        fleet: Arc<FleetManager>,
        provider: Option<Arc<dyn Provider>>,
        options: QueryOptions,
    ) -> Self {
        Self {
            fleet,
            provider,
            options,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn answer(&self, query: &str) -> String {
        let (answer, generated) = self.generate(query).await;
        self.fleet.event_bus().publish(DomainEvent::QueryAnswered {
            generated,
            answer_len: answer.len(),
            timestamp: Utc::now(),
        });
        answer
    }

    pub async fn handle(&self, request: QueryRequest) -> QueryResponse {
        QueryResponse {
            answer: self.answer(&request.query).await,
        }
    }

    async fn generate(&self, query: &str) -> (String, bool) {
        let Some(provider) = &self.provider else {
            return (NOT_CONFIGURED_ANSWER.to_string(), false);
        };

        let facts = self.fleet.snapshot().await.facts_summary();
        let prompt = build_prompt(&facts, query);
        debug!(prompt = %prompt, "Prompt assembled");

        let request = ProviderRequest {
            model: self.options.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: self.options.temperature,
            max_tokens: None,
        };

        match tokio::time::timeout(self.options.timeout, provider.complete(request)).await {
            Err(_) => {
                let secs = self.options.timeout.as_secs();
                warn!(provider = provider.name(), timeout_secs = secs, "Generation timed out");
                (format!("LLM error: request timed out after {secs}s"), false)
            }
            Ok(Err(e)) => {
                warn!(provider = provider.name(), error = %e, "Generation failed");
                (format!("LLM error: {e}"), false)
            }
            Ok(Ok(response)) => {
                let text = response.message.content.trim();
                if text.is_empty() {
                    warn!(provider = provider.name(), "Generation returned no text");
                    (EMPTY_ANSWER.to_string(), false)
                } else {
                    info!(model = %response.model, answer_len = text.len(), "Query answered");
                    (text.to_string(), true)
                }
            }
        }
    }
}

/// Instruction, retrieved facts, and the query in labelled sections.
pub fn build_prompt(facts: &str, query: &str) -> String {
    format!(
        "{INSTRUCTION}\n\n--- FACTS ---\n{facts}\n\n--- USER QUERY ---\n{query}\n\n--- ANSWER ---\n"
    )
}
