//! Configuration for the bot

use crate::error::{BotError, Result};
use nifty_utils::{EnvError, env_flag, env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Model used for both agents unless overridden
pub const DEFAULT_MODEL: &str = "mistralai/mistral-7b-instruct";

/// Data provider for market data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataProvider {
    /// Yahoo Finance (default, no API key required)
    #[default]
    Yahoo,
    /// Alpha Vantage (requires API key)
    AlphaVantage,
}

impl std::str::FromStr for DataProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "alpha_vantage" | "alphavantage" => Ok(Self::AlphaVantage),
            other => Err(format!("unknown data provider '{other}'")),
        }
    }
}

/// Price moves that trigger a position alert, in percent from entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Alert when change >= this (positive)
    pub up: f64,
    /// Alert when change <= this (negative)
    pub down: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self { up: 3.0, down: -2.0 }
    }
}

/// Limits for the ATR / volume check on recommended picks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityThresholds {
    /// ATR lookback in sessions
    pub atr_period: usize,
    /// Volume averaging window in sessions
    pub volume_period: usize,
    /// ATR% must reach `target% * atr_multiple`
    pub atr_multiple: f64,
    /// Minimum average daily volume in shares
    pub min_avg_volume: f64,
    /// Calendar days of daily history to request
    pub history_days: u32,
}

impl Default for LiquidityThresholds {
    fn default() -> Self {
        Self {
            atr_period: 14,
            volume_period: 20,
            atr_multiple: 0.5,
            min_avg_volume: 500_000.0,
            history_days: 60,
        }
    }
}

/// Configuration for the bot
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token from BotFather
    pub telegram_token: String,

    /// OpenRouter API key
    pub openrouter_api_key: String,

    /// Override for the OpenRouter base URL
    pub openrouter_api_base: Option<String>,

    /// Model used by both agents
    pub model: String,

    /// Directory holding `positions.json` and `monitor.json`
    pub data_dir: PathBuf,

    /// Market data provider
    pub data_provider: DataProvider,

    /// Alpha Vantage API key (optional)
    pub alpha_vantage_api_key: Option<String>,

    /// Alpha Vantage requests per minute
    pub alpha_vantage_rate_limit: u32,

    /// Delay between monitoring sweeps
    pub poll_interval: Duration,

    /// Only sweep during the NSE session
    pub market_hours_only: bool,

    /// Alert thresholds
    pub thresholds: AlertThresholds,

    /// Pick validation limits
    pub liquidity: LiquidityThresholds,

    /// Number of picks requested from the LLM
    pub max_picks: usize,

    /// Cache TTL for quotes
    pub cache_ttl_realtime: Duration,

    /// Maximum number of attempts for market data calls
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Telegram long-poll timeout
    pub long_poll_timeout: Duration,

    /// Outgoing Telegram messages per second
    pub telegram_rate_limit: u32,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_token", &"<redacted>")
            .field("openrouter_api_key", &"<redacted>")
            .field("openrouter_api_base", &self.openrouter_api_base)
            .field("model", &self.model)
            .field("data_dir", &self.data_dir)
            .field("data_provider", &self.data_provider)
            .field("poll_interval", &self.poll_interval)
            .field("market_hours_only", &self.market_hours_only)
            .field("thresholds", &self.thresholds)
            .field("liquidity", &self.liquidity)
            .finish_non_exhaustive()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            openrouter_api_key: String::new(),
            openrouter_api_base: None,
            model: DEFAULT_MODEL.to_string(),
            data_dir: PathBuf::from("data"),
            data_provider: DataProvider::Yahoo,
            alpha_vantage_api_key: None,
            alpha_vantage_rate_limit: 5,
            poll_interval: Duration::from_secs(3600), // 1 hour
            market_hours_only: true,
            thresholds: AlertThresholds::default(),
            liquidity: LiquidityThresholds::default(),
            max_picks: 5,
            cache_ttl_realtime: Duration::from_secs(60),
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(1),
            long_poll_timeout: Duration::from_secs(30),
            telegram_rate_limit: 25,
        }
    }
}

impl BotConfig {
    /// Create a new configuration builder
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder::default()
    }

    /// Build configuration from the environment alone
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.telegram_token.trim().is_empty() {
            return Err(EnvError::Missing("TELEGRAM_BOT_TOKEN".to_string()).into());
        }

        if self.openrouter_api_key.trim().is_empty() {
            return Err(EnvError::Missing("OPENROUTER_API_KEY".to_string()).into());
        }

        if self.data_provider == DataProvider::AlphaVantage
            && self.alpha_vantage_api_key.is_none()
        {
            return Err(EnvError::Missing("ALPHA_VANTAGE_API_KEY".to_string()).into());
        }

        if self.thresholds.up.is_nan() || self.thresholds.up <= 0.0 {
            return Err(BotError::ConfigError(
                "up threshold must be greater than 0".to_string(),
            ));
        }

        if self.thresholds.down.is_nan() || self.thresholds.down >= 0.0 {
            return Err(BotError::ConfigError(
                "down threshold must be less than 0".to_string(),
            ));
        }

        if self.poll_interval < Duration::from_secs(60) {
            return Err(BotError::ConfigError(
                "poll interval must be at least 60 seconds".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(BotError::ConfigError(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.max_picks == 0 {
            return Err(BotError::ConfigError(
                "max_picks must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the positions file
    pub fn positions_path(&self) -> PathBuf {
        self.data_dir.join("positions.json")
    }

    /// Path of the monitored-chats file
    pub fn monitor_path(&self) -> PathBuf {
        self.data_dir.join("monitor.json")
    }
}

/// Builder for BotConfig
#[derive(Default)]
pub struct BotConfigBuilder {
    telegram_token: Option<String>,
    openrouter_api_key: Option<String>,
    openrouter_api_base: Option<String>,
    model: Option<String>,
    data_dir: Option<PathBuf>,
    data_provider: Option<DataProvider>,
    alpha_vantage_api_key: Option<String>,
    poll_interval: Option<Duration>,
    market_hours_only: Option<bool>,
    up_threshold: Option<f64>,
    down_threshold: Option<f64>,
    liquidity: Option<LiquidityThresholds>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    cache_ttl_realtime: Option<Duration>,
}

fn redacted(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

impl std::fmt::Debug for BotConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfigBuilder")
            .field("telegram_token", &redacted(self.telegram_token.as_ref()))
            .field("openrouter_api_key", &redacted(self.openrouter_api_key.as_ref()))
            .field("openrouter_api_base", &self.openrouter_api_base)
            .field("model", &self.model)
            .field("data_dir", &self.data_dir)
            .field("data_provider", &self.data_provider)
            .field(
                "alpha_vantage_api_key",
                &redacted(self.alpha_vantage_api_key.as_ref()),
            )
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl BotConfigBuilder {
    /// Set the Telegram bot token
    pub fn telegram_token(mut self, token: impl Into<String>) -> Self {
        self.telegram_token = Some(token.into());
        self
    }

    /// Set the OpenRouter API key
    pub fn openrouter_api_key(mut self, key: impl Into<String>) -> Self {
        self.openrouter_api_key = Some(key.into());
        self
    }

    /// Set the OpenRouter base URL
    pub fn openrouter_api_base(mut self, base: impl Into<String>) -> Self {
        self.openrouter_api_base = Some(base.into());
        self
    }

    /// Set the model used by both agents
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the market data provider
    pub fn data_provider(mut self, provider: DataProvider) -> Self {
        self.data_provider = Some(provider);
        self
    }

    /// Set Alpha Vantage API key
    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Set the delay between monitoring sweeps
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Restrict sweeps to the NSE session
    pub fn market_hours_only(mut self, enabled: bool) -> Self {
        self.market_hours_only = Some(enabled);
        self
    }

    /// Set the up alert threshold (percent)
    pub fn up_threshold(mut self, pct: f64) -> Self {
        self.up_threshold = Some(pct);
        self
    }

    /// Set the down alert threshold (percent, negative)
    pub fn down_threshold(mut self, pct: f64) -> Self {
        self.down_threshold = Some(pct);
        self
    }

    /// Set pick validation limits
    pub fn liquidity(mut self, liquidity: LiquidityThresholds) -> Self {
        self.liquidity = Some(liquidity);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set cache TTL for quotes
    pub fn cache_ttl_realtime(mut self, duration: Duration) -> Self {
        self.cache_ttl_realtime = Some(duration);
        self
    }

    /// Fill every field that is still unset from the environment
    pub fn with_env(mut self) -> Result<Self> {
        self.telegram_token = self
            .telegram_token
            .or_else(|| env_string("TELEGRAM_BOT_TOKEN"));
        self.openrouter_api_key = self
            .openrouter_api_key
            .or_else(|| env_string("OPENROUTER_API_KEY"));
        self.openrouter_api_base = self
            .openrouter_api_base
            .or_else(|| env_string("OPENROUTER_API_BASE"));
        self.model = self.model.or_else(|| env_string("OPENROUTER_MODEL"));
        self.data_dir = self
            .data_dir
            .or_else(|| env_string("NIFTY_DATA_DIR").map(PathBuf::from));
        self.alpha_vantage_api_key = self
            .alpha_vantage_api_key
            .or_else(|| env_string("ALPHA_VANTAGE_API_KEY"));

        if self.data_provider.is_none() {
            self.data_provider = env_parse("NIFTY_DATA_PROVIDER")?;
        }
        if self.poll_interval.is_none() {
            self.poll_interval =
                env_parse::<u64>("NIFTY_POLL_INTERVAL_SECS")?.map(Duration::from_secs);
        }
        if self.market_hours_only.is_none() {
            self.market_hours_only = env_flag("NIFTY_MARKET_HOURS_ONLY")?;
        }
        if self.up_threshold.is_none() {
            self.up_threshold = env_parse("NIFTY_UP_THRESHOLD")?;
        }
        if self.down_threshold.is_none() {
            self.down_threshold = env_parse("NIFTY_DOWN_THRESHOLD")?;
        }

        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<BotConfig> {
        let defaults = BotConfig::default();

        let config = BotConfig {
            telegram_token: self.telegram_token.unwrap_or_default(),
            openrouter_api_key: self.openrouter_api_key.unwrap_or_default(),
            openrouter_api_base: self.openrouter_api_base,
            model: self.model.unwrap_or(defaults.model),
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            data_provider: self.data_provider.unwrap_or(defaults.data_provider),
            alpha_vantage_api_key: self.alpha_vantage_api_key,
            alpha_vantage_rate_limit: defaults.alpha_vantage_rate_limit,
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            market_hours_only: self
                .market_hours_only
                .unwrap_or(defaults.market_hours_only),
            thresholds: AlertThresholds {
                up: self.up_threshold.unwrap_or(defaults.thresholds.up),
                down: self.down_threshold.unwrap_or(defaults.thresholds.down),
            },
            liquidity: self.liquidity.unwrap_or(defaults.liquidity),
            max_picks: defaults.max_picks,
            cache_ttl_realtime: self
                .cache_ttl_realtime
                .unwrap_or(defaults.cache_ttl_realtime),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self
                .retry_backoff_base
                .unwrap_or(defaults.retry_backoff_base),
            long_poll_timeout: defaults.long_poll_timeout,
            telegram_rate_limit: defaults.telegram_rate_limit,
        };

        config.validate()?;
        Ok(config)
    }
}
