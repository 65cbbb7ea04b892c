//! Core Agent trait definition

use crate::{Context, Result};
use async_trait::async_trait;

/// A single LLM-backed step in the advice pipeline
///
/// Input and output stay as `String` so each agent decides its own wire
/// format (the recommendation agent takes JSON, the validator a symbol list).
#[async_trait]
pub trait Agent: Send + Sync {
    /// Process input and return output
    async fn process(&self, input: String, context: &mut Context) -> Result<String>;

    /// Get the agent's name
    fn name(&self) -> &str;
}
