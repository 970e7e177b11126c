//! Chat-completions client for OpenAI-compatible endpoints.
//!
//! ASI:One speaks this protocol, as do OpenAI, OpenRouter, Groq, Together,
//! Ollama, vLLM and llama.cpp servers.

use std::time::Duration;

use async_trait::async_trait;
use echonet_core::error::ProviderError;
use echonet_core::message::{Message, Role};
use echonet_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(DEFAULT_TIMEOUT),
        }
    }

    /// Bound every request to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        debug!(provider = %self.name, model = %request.model, "Requesting completion");

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Err(ProviderError::RateLimited { retry_after_secs });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::AuthenticationFailed(format!(
                    "{} rejected the API key",
                    self.name
                )));
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(provider = %self.name, status = status.as_u16(), body = %message, "Completion failed");
                return Err(ProviderError::ApiError {
                    status_code: status.as_u16(),
                    message,
                });
            }
        }

        let completion: ChatCompletion =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: StatusCode::OK.as_u16(),
                message: format!("Unreadable completion: {e}"),
            })?;
        completion.into_response()
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(network_error)?;
        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: Role,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.clone(),
            content: m.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

/// The role is not read back; some servers send roles outside [`Role`].
#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl ChatCompletion {
    fn into_response(self) -> Result<ProviderResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: StatusCode::OK.as_u16(),
                message: "Completion had no choices".into(),
            })?;

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: self.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: self.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let provider = OpenAiCompatProvider::new("asi1", "https://api.asi1.ai/v1/", "sk-test");
        assert_eq!(provider.name(), "asi1");
        assert_eq!(provider.endpoint("chat/completions"), "https://api.asi1.ai/v1/chat/completions");
    }

    #[test]
    fn request_body_shape() {
        let messages = [Message::user("How loud?")];
        let body = ChatRequest {
            model: "asi1-extended",
            messages: messages.iter().map(ChatMessage::from).collect(),
            temperature: 0.2,
            max_tokens: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "asi1-extended");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "How loud?");
        assert_eq!(json["stream"], false);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn parse_completion() {
        let data = r#"{
            "model": "asi1-extended",
            "choices": [{"message": {"role": "assistant", "content": "Park is quiet at night."}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 6, "total_tokens": 46}
        }"#;
        let completion: ChatCompletion = serde_json::from_str(data).unwrap();
        let response = completion.into_response().unwrap();
        assert_eq!(response.message.content, "Park is quiet at night.");
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.model, "asi1-extended");
        assert_eq!(response.usage.unwrap().total_tokens, 46);
    }

    #[test]
    fn null_content_reads_as_empty() {
        let data = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(data).unwrap();
        assert_eq!(completion.into_response().unwrap().message.content, "");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let completion: ChatCompletion =
            serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        assert!(matches!(
            completion.into_response(),
            Err(ProviderError::ApiError { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let provider = OpenAiCompatProvider::new("test", "http://127.0.0.1:1/v1", "sk")
            .with_timeout(Duration::from_secs(2));
        let request = ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.2,
            max_tokens: None,
        };
        let err = provider.complete(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_) | ProviderError::Timeout(_)));
        assert!(provider.health_check().await.is_err());
    }
}
