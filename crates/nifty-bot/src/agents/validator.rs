//! Agent #2: yes/no sanity check of recommended symbols

use super::{AgentSettings, ask};
use crate::parser::format_percent;
use crate::prompts::Prompts;
use async_trait::async_trait;
use nifty_core::{Agent, Context, Error, Result};
use nifty_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Symbols to check against the intraday target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationInput {
    pub symbols: Vec<String>,
    pub target_percent: f64,
}

/// Asks whether each symbol can plausibly reach the target today.
pub struct ValidationAgent {
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<Prompts>,
    settings: AgentSettings,
}

impl ValidationAgent {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        prompts: Arc<Prompts>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            prompts,
            settings,
        }
    }

    pub async fn validate(&self, input: &ValidationInput, context: &mut Context) -> Result<String> {
        if input.symbols.is_empty() {
            return Err(Error::InvalidInput("no symbols to validate".to_string()));
        }

        let prompt = self
            .prompts
            .validation(&input.symbols, &format_percent(input.target_percent))
            .map_err(Error::from)?;
        tracing::debug!(%prompt, "validation prompt");

        ask(&self.provider, &self.settings, prompt, context).await
    }
}

#[async_trait]
impl Agent for ValidationAgent {
    async fn process(&self, input: String, context: &mut Context) -> Result<String> {
        let input: ValidationInput = serde_json::from_str(&input)
            .map_err(|e| Error::InvalidInput(format!("expected validation JSON: {e}")))?;
        self.validate(&input, context).await
    }

    fn name(&self) -> &str {
        "ValidationAgent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_validate_prompt_and_reply() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(
            "TCS: Yes\nINFY: No".to_string()
        )]));
        let agent = ValidationAgent::new(
            Arc::clone(&provider) as Arc<dyn LLMProvider>,
            Arc::new(Prompts::new().unwrap()),
            AgentSettings::new("m"),
        );
        let mut ctx = Context::new();

        let input = serde_json::json!({ "symbols": ["TCS", "INFY"], "target_percent": 3.0 });
        let reply = agent.process(input.to_string(), &mut ctx).await.unwrap();

        assert_eq!(reply, "TCS: Yes\nINFY: No");
        assert_eq!(
            provider.prompts()[0],
            "Symbols: TCS, INFY. Can each plausibly hit 3% intraday profit? Yes or No."
        );
    }

    #[tokio::test]
    async fn test_empty_symbols_rejected() {
        let provider = Arc::new(ScriptedProvider::default());
        let agent = ValidationAgent::new(
            Arc::clone(&provider) as Arc<dyn LLMProvider>,
            Arc::new(Prompts::new().unwrap()),
            AgentSettings::new("m"),
        );
        let mut ctx = Context::new();

        let input = ValidationInput {
            symbols: vec![],
            target_percent: 2.0,
        };
        assert!(matches!(
            agent.validate(&input, &mut ctx).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(provider.prompts().is_empty());
    }
}
