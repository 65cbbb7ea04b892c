//! Agent #1: intraday stock recommendations

use super::{AgentSettings, ask};
use crate::parser::InvestmentRequest;
use crate::prompts::Prompts;
use async_trait::async_trait;
use nifty_core::{Agent, Context, Error, Result};
use nifty_llm::LLMProvider;
use std::sync::Arc;

/// Asks the model for liquid NSE/BSE picks for an investment request.
///
/// Input is an [`InvestmentRequest`] serialised as JSON. Output is the raw
/// model reply, one pick per line when the model follows instructions.
pub struct RecommendationAgent {
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<Prompts>,
    settings: AgentSettings,
    pick_count: usize,
}

impl RecommendationAgent {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        prompts: Arc<Prompts>,
        settings: AgentSettings,
        pick_count: usize,
    ) -> Self {
        Self {
            provider,
            prompts,
            settings,
            pick_count,
        }
    }

    /// Typed entry point used by the advisor
    pub async fn recommend(
        &self,
        request: &InvestmentRequest,
        context: &mut Context,
    ) -> Result<String> {
        let prompt = self
            .prompts
            .recommendation(request.amount, &request.percent_label(), self.pick_count)
            .map_err(Error::from)?;

        tracing::info!(
            amount = request.amount,
            target = request.target_percent,
            model = %self.settings.model,
            "requesting recommendations"
        );

        ask(&self.provider, &self.settings, prompt, context).await
    }
}

#[async_trait]
impl Agent for RecommendationAgent {
    async fn process(&self, input: String, context: &mut Context) -> Result<String> {
        let request: InvestmentRequest = serde_json::from_str(&input)
            .map_err(|e| Error::InvalidInput(format!("expected investment request JSON: {e}")))?;
        self.recommend(&request, context).await
    }

    fn name(&self) -> &str {
        "RecommendationAgent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use nifty_llm::LLMError;

    fn agent(provider: Arc<ScriptedProvider>) -> RecommendationAgent {
        RecommendationAgent::new(
            provider,
            Arc::new(Prompts::new().unwrap()),
            AgentSettings::new("mistralai/mistral-7b-instruct"),
            5,
        )
    }

    #[tokio::test]
    async fn test_process_renders_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "TCS – steady volumes\nINFY – IT momentum".to_string(),
        )]));
        let agent = agent(Arc::clone(&provider));
        let mut ctx = Context::new();

        let input = serde_json::to_string(&InvestmentRequest {
            amount: 20_000,
            target_percent: 3.0,
        })
        .unwrap();
        let reply = agent.process(input, &mut ctx).await.unwrap();

        assert!(reply.starts_with("TCS"));
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("investing ₹20000 with a goal of 3% intraday profit"));
        assert_eq!(ctx.model(), Some("mistralai/mistral-7b-instruct"));
    }

    #[tokio::test]
    async fn test_process_rejects_bad_input() {
        let provider = Arc::new(ScriptedProvider::default());
        let agent = agent(provider);
        let mut ctx = Context::new();

        let err = agent.process("₹20000 @ 3%".to_string(), &mut ctx).await;
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            LLMError::RateLimitExceeded("slow down".to_string()),
        )]));
        let agent = agent(provider);
        let mut ctx = Context::new();

        let request = InvestmentRequest {
            amount: 1000,
            target_percent: 1.0,
        };
        let err = agent.recommend(&request, &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn test_blank_reply_is_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("   ".to_string())]));
        let agent = agent(provider);
        let mut ctx = Context::new();

        let request = InvestmentRequest {
            amount: 1000,
            target_percent: 1.0,
        };
        assert!(agent.recommend(&request, &mut ctx).await.is_err());
    }
}
