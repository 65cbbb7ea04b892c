//! Environment configuration helpers
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// Variable is required but unset or empty
    #[error("{0} is not set")]
    Missing(String),

    /// Variable is set but does not parse
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Load a `.env` file if one exists. Returns whether a file was loaded.
pub fn load_dotenv() -> bool {
    match dotenv::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            true
        }
        Err(_) => false,
    }
}

/// Read a non-empty string variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, `Ok(None)` when unset
pub fn env_parse<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => parse_value(key, &raw).map(Some),
    }
}

/// Read a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`)
pub fn env_flag(key: &str) -> Result<Option<bool>, EnvError> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => parse_flag(key, &raw).map(Some),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| EnvError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, EnvError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        let v: u64 = parse_value("NIFTY_POLL_INTERVAL_SECS", "3600").unwrap();
        assert_eq!(v, 3600);

        let err = parse_value::<f64>("NIFTY_UP_THRESHOLD", "three").unwrap_err();
        assert!(matches!(err, EnvError::Invalid { .. }));
        assert!(err.to_string().contains("NIFTY_UP_THRESHOLD"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("X", "TRUE"), Ok(true));
        assert_eq!(parse_flag("X", "off"), Ok(false));
        assert!(parse_flag("X", "maybe").is_err());
    }

    #[test]
    fn test_missing_display() {
        let err = EnvError::Missing("TELEGRAM_BOT_TOKEN".to_string());
        assert_eq!(err.to_string(), "TELEGRAM_BOT_TOKEN is not set");
    }
}
