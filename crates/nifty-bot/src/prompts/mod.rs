//! Prompt templates for the two LLM agents
//!
//! Templates use Jinja syntax and are compiled once into a shared
//! [`minijinja::Environment`].

use crate::error::Result;
use minijinja::Environment;
use serde_json::json;

/// System prompt shared by both agents
pub const ANALYST_SYSTEM: &str = "You are an Indian equities analyst who follows NSE and BSE \
intraday trading. Be concise and factual.";

const RECOMMEND: &str = "Recommend {{ count }} highly liquid NSE/BSE stocks for investing \
₹{{ amount }} with a goal of {{ percent }}% intraday profit. Provide a brief rationale for each.
Answer with one stock per line as `SYMBOL – rationale`, using the NSE ticker as SYMBOL.";

const VALIDATE: &str = "Symbols: {{ symbols | join(', ') }}. \
Can each plausibly hit {{ percent }}% intraday profit? Yes or No.";

/// Template names
pub mod names {
    pub const RECOMMEND: &str = "recommend";
    pub const VALIDATE: &str = "validate";
}

/// Compiled prompt templates
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    /// Compile the built-in templates
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(names::RECOMMEND, RECOMMEND)?;
        env.add_template(names::VALIDATE, VALIDATE)?;
        Ok(Self { env })
    }

    /// Prompt for agent #1
    pub fn recommendation(&self, amount: u64, percent: &str, count: usize) -> Result<String> {
        let tmpl = self.env.get_template(names::RECOMMEND)?;
        Ok(tmpl.render(json!({
            "amount": amount,
            "percent": percent,
            "count": count,
        }))?)
    }

    /// Prompt for agent #2
    pub fn validation(&self, symbols: &[String], percent: &str) -> Result<String> {
        let tmpl = self.env.get_template(names::VALIDATE)?;
        Ok(tmpl.render(json!({
            "symbols": symbols,
            "percent": percent,
        }))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_prompt() {
        let prompts = Prompts::new().unwrap();
        let prompt = prompts.recommendation(20_000, "3", 5).unwrap();
        assert!(prompt.starts_with(
            "Recommend 5 highly liquid NSE/BSE stocks for investing ₹20000 with a goal of 3% intraday profit."
        ));
        assert!(prompt.contains("Provide a brief rationale for each."));
        assert!(prompt.contains("SYMBOL – rationale"));
    }

    #[test]
    fn test_validation_prompt() {
        let prompts = Prompts::new().unwrap();
        let symbols = vec!["TCS".to_string(), "INFY".to_string()];
        let prompt = prompts.validation(&symbols, "2.5").unwrap();
        assert_eq!(
            prompt,
            "Symbols: TCS, INFY. Can each plausibly hit 2.5% intraday profit? Yes or No."
        );
    }
}
