//! LLM agents used by the advisor
//!
//! Agent #1 recommends picks, agent #2 sanity-checks them. Both send a single
//! user prompt through an [`LLMProvider`] and hand back the raw text.

pub mod recommender;
pub mod validator;

pub use recommender::RecommendationAgent;
pub use validator::{ValidationAgent, ValidationInput};

use crate::error::BotError;
use crate::prompts::ANALYST_SYSTEM;
use nifty_core::{Context, Error, Result};
use nifty_llm::{CompletionRequest, LLMProvider, Message};
use std::sync::Arc;

/// Request settings shared by both agents
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl AgentSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 600,
            temperature: 0.4,
        }
    }
}

/// Send one prompt and return the trimmed reply text
async fn ask(
    provider: &Arc<dyn LLMProvider>,
    settings: &AgentSettings,
    prompt: String,
    context: &mut Context,
) -> Result<String> {
    let request = CompletionRequest::builder(&settings.model)
        .system(ANALYST_SYSTEM)
        .add_message(Message::user(prompt))
        .max_tokens(settings.max_tokens)
        .temperature(settings.temperature)
        .build();

    let response = provider
        .complete(request)
        .await
        .map_err(|e| Error::from(BotError::from(e)))?;

    tracing::debug!(
        model = %response.model,
        tokens = response.usage.total(),
        "completion received"
    );
    context.set_model(response.model.clone());

    response
        .message
        .text()
        .map(str::to_string)
        .ok_or_else(|| Error::ProcessingFailed("model returned an empty reply".to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use nifty_llm::{
        CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason,
        TokenUsage,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays canned replies and records the prompts it saw
    #[derive(Default)]
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LLMError>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<Result<String, LLMError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
                .collect()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> nifty_llm::Result<CompletionResponse> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::RequestFailed("no scripted reply".into())))?;
            Ok(CompletionResponse {
                message: Message::assistant(reply),
                model,
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
