//! OpenAI-compatible provider implementation
//!
//! Speaks the `/chat/completions` protocol shared by OpenAI, OpenRouter and
//! most self-hosted gateways. NiftyNavigator uses it against OpenRouter.
//!
//! # Example
//!
//! ```no_run
//! use nifty_llm::{CompletionRequest, LLMProvider, Message};
//! use nifty_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAIProvider::with_config(OpenAIConfig::openrouter("sk-or-..."))?;
//!
//!     let request = CompletionRequest::builder("mistralai/mistral-7b-instruct")
//!         .add_message(Message::user("Name one liquid NSE stock."))
//!         .max_tokens(64)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.content);
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_REFERER: &str = "https://openrouter.ai";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const OPENROUTER_TIMEOUT_SECS: u64 = 60;

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL, without the trailing `/chat/completions`
    pub api_base: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Extra headers sent with every request
    pub extra_headers: Vec<(String, String)>,

    /// Name reported by [`LLMProvider::name`]
    pub provider_name: String,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            extra_headers: Vec::new(),
            provider_name: "openai".to_string(),
        }
    }

    /// OpenRouter preset: base URL, referer header and a 60 s timeout
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: OPENROUTER_API_BASE.to_string(),
            timeout_secs: OPENROUTER_TIMEOUT_SECS,
            extra_headers: vec![("HTTP-Referer".to_string(), OPENROUTER_REFERER.to_string())],
            provider_name: "openrouter".to_string(),
        }
    }

    /// Create an OpenRouter config from `OPENROUTER_API_KEY` (and `OPENROUTER_API_BASE` if set)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("OPENROUTER_API_KEY environment variable not set".to_string())
        })?;

        let mut config = Self::openrouter(api_key);
        if let Ok(base) = std::env::var("OPENROUTER_API_BASE") {
            config.api_base = base;
        }
        Ok(config)
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

/// OpenAI-compatible chat completion provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LLMError::ConfigurationError("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create an OpenRouter provider from the environment
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, provider = %self.config.provider_name))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending chat completion to {}", self.config.api_base);

        let wire_request = ChatRequest {
            model: request.model.clone(),
            messages: build_chat_messages(request.system, request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut builder = self
            .client
            .post(self.config.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");
        for (name, value) in &self.config.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.json(&wire_request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(map_status_error(status.as_u16(), error_text, request.model));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        into_completion(body, request.model)
    }

    fn name(&self) -> &str {
        &self.config.provider_name
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    /// Routers report upstream failures in-band with a 200 status
    #[serde(default)]
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// System prompt goes first in the messages array
fn build_chat_messages(system: Option<String>, messages: Vec<Message>) -> Vec<ChatMessage> {
    system
        .map(Message::system)
        .into_iter()
        .chain(messages)
        .map(|m| ChatMessage {
            role: m.role.as_str().to_string(),
            content: Some(m.content),
        })
        .collect()
}

fn map_status_error(status: u16, body: String, model: String) -> LLMError {
    match status {
        401 | 403 => LLMError::AuthenticationFailed,
        429 => LLMError::RateLimitExceeded(body),
        400 => LLMError::InvalidRequest(body),
        404 => LLMError::ModelNotFound(model),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

fn into_completion(body: ChatResponse, requested_model: String) -> Result<CompletionResponse> {
    if let Some(err) = body.error {
        let code = err.code.map(|c| c.to_string()).unwrap_or_default();
        return Err(if code == "429" {
            LLMError::RateLimitExceeded(err.message)
        } else {
            LLMError::RequestFailed(err.message)
        });
    }

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

    let finish_reason = choice.finish_reason.unwrap_or_default();
    let usage = body.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    debug!(
        "Received response - finish_reason: {}, tokens: {}/{}",
        finish_reason, usage.input_tokens, usage.output_tokens
    );

    Ok(CompletionResponse {
        message: Message {
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
        },
        model: body.model.unwrap_or(requested_model),
        stop_reason: map_stop_reason(&finish_reason),
        usage,
    })
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" | "" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        other => {
            warn!("Unknown finish reason: {}", other);
            StopReason::EndTurn
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openrouter_preset() {
        let provider = OpenAIProvider::with_config(OpenAIConfig::openrouter("test-key")).unwrap();
        assert_eq!(provider.name(), "openrouter");
        assert_eq!(provider.config().api_base, "https://openrouter.ai/api/v1");
        assert_eq!(provider.config().timeout_secs, 60);
        assert!(
            provider
                .config()
                .extra_headers
                .iter()
                .any(|(k, _)| k == "HTTP-Referer")
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = OpenAIProvider::with_config(OpenAIConfig::new("  "));
        assert!(matches!(result, Err(LLMError::ConfigurationError(_))));
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let config = OpenAIConfig::new("k").with_api_base("http://localhost:1234/v1/");
        assert_eq!(
            config.completions_url(),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_system_message_first() {
        let messages = build_chat_messages(
            Some("You are an analyst".to_string()),
            vec![Message::user("Hi")],
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content.as_deref(), Some("You are an analyst"));
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status_error(401, String::new(), "m".into()),
            LLMError::AuthenticationFailed
        ));
        assert!(matches!(
            map_status_error(429, "slow".into(), "m".into()),
            LLMError::RateLimitExceeded(_)
        ));
        assert!(matches!(
            map_status_error(404, String::new(), "gone/model".into()),
            LLMError::ModelNotFound(m) if m == "gone/model"
        ));
        assert!(matches!(
            map_status_error(502, "bad gateway".into(), "m".into()),
            LLMError::RequestFailed(_)
        ));
    }

    #[test]
    fn test_parse_success_body() {
        let body: ChatResponse = serde_json::from_str(
            r#"{
                "model": "mistralai/mistral-7b-instruct",
                "choices": [{"message": {"role": "assistant", "content": "TCS – steady"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 40, "completion_tokens": 6}
            }"#,
        )
        .unwrap();

        let response = into_completion(body, "fallback".into()).unwrap();
        assert_eq!(response.message.content, "TCS – steady");
        assert_eq!(response.model, "mistralai/mistral-7b-instruct");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.total(), 46);
    }

    #[test]
    fn test_in_band_error() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"error": {"message": "Rate limit exceeded", "code": 429}}"#,
        )
        .unwrap();

        let err = into_completion(body, "m".into()).unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded(_)));
    }

    #[test]
    fn test_no_choices() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = into_completion(body, "m".into()).unwrap_err();
        assert!(matches!(err, LLMError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("stop"), StopReason::EndTurn);
        assert_eq!(map_stop_reason("length"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("content_filter"), StopReason::ContentFilter);
        assert_eq!(map_stop_reason("unknown"), StopReason::EndTurn);
    }
}
