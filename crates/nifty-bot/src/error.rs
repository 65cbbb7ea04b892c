//! Error types for the bot

use std::time::Duration;
use thiserror::Error;

/// Bot errors
#[derive(Debug, Error)]
pub enum BotError {
    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for a provider
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded {
        provider: String,
        retry_after: Option<Duration>,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Alpha Vantage API error
    #[error("Alpha Vantage error: {0}")]
    AlphaVantageError(String),

    /// Telegram Bot API error
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// LLM call failed
    #[error("LLM error: {0}")]
    Llm(#[from] nifty_llm::LLMError),

    /// Agent step failed
    #[error("Agent error: {0}")]
    Agent(#[from] nifty_core::Error),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Prompt template error
    #[error("Prompt error: {0}")]
    PromptError(String),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BotError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::YahooFinanceError(_) => true,
            Self::NetworkError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Llm(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

/// Convert BotError to nifty_core::Error
impl From<BotError> for nifty_core::Error {
    fn from(err: BotError) -> Self {
        nifty_core::Error::ProcessingFailed(err.to_string())
    }
}

impl From<nifty_utils::EnvError> for BotError {
    fn from(err: nifty_utils::EnvError) -> Self {
        BotError::ConfigError(err.to_string())
    }
}

impl From<minijinja::Error> for BotError {
    fn from(err: minijinja::Error) -> Self {
        BotError::PromptError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BotError::InvalidSymbol("XYZ!".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: XYZ!");

        let err = BotError::DataUnavailable {
            symbol: "TCS".to_string(),
            reason: "No data found".to_string(),
        };
        assert_eq!(err.to_string(), "Data not available for TCS: No data found");
    }

    #[test]
    fn test_error_conversion() {
        let bot_err = BotError::Telegram("chat not found".to_string());
        let core_err: nifty_core::Error = bot_err.into();

        match core_err {
            nifty_core::Error::ProcessingFailed(msg) => {
                assert!(msg.contains("chat not found"));
            }
            _ => panic!("Expected ProcessingFailed variant"),
        }
    }

    #[test]
    fn test_transient() {
        let limited = BotError::RateLimitExceeded {
            provider: "Telegram".to_string(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert!(limited.is_transient());
        assert!(!BotError::InvalidSymbol("X".to_string()).is_transient());
        assert!(!BotError::StorageError("corrupt".to_string()).is_transient());
    }
}
