//! Error types for nifty-core

use thiserror::Error;

/// Result type alias for nifty-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input handed to an agent could not be interpreted
    #[error("Invalid agent input: {0}")]
    InvalidInput(String),

    /// Agent processing failed
    #[error("Agent processing failed: {0}")]
    ProcessingFailed(String),
}
