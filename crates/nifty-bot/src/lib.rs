//! NiftyNavigator: a Telegram bot for NSE intraday picks
//!
//! - `₹<amount> @ <percent>%` asks an LLM for five liquid NSE picks, screens
//!   each on ATR and average volume, and has a second prompt sanity-check them
//! - `I buy <SYMBOL>` records a position at the latest price
//! - `/monitor` checks every position hourly and alerts at +3% / -2%
//!
//! # Architecture
//!
//! - [`parser`]: message patterns and symbol helpers
//! - [`agents`]: recommendation and validation agents over an `LLMProvider`
//! - [`api`]: Yahoo Finance, Alpha Vantage and Telegram clients
//! - [`market`]: cached, retried price lookups behind the [`MarketData`] trait
//! - [`indicators`]: ATR / volume screening
//! - [`advisor`]: the two-agent recommendation flow
//! - [`storage`]: JSON persistence for positions and monitored chats
//! - [`monitor`]: per-chat polling tasks and alert formatting
//! - [`bot`]: command parsing and the long-polling dispatcher
//!
//! # Example
//!
//! ```rust,ignore
//! use nifty_bot::{BotConfig, NiftyBot};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotConfig::from_env()?;
//!     // wire the advisor, stores and monitor registry, then
//!     // Arc::new(bot).run(&telegram, config.long_poll_timeout).await?;
//!     Ok(())
//! }
//! ```

pub mod advisor;
pub mod agents;
pub mod api;
pub mod bot;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod indicators;
pub mod market;
pub mod monitor;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod storage;

pub use advisor::{Advice, Advisor, Pick};
pub use bot::{Command, NiftyBot};
pub use config::{BotConfig, DataProvider};
pub use error::{BotError, Result};
pub use market::{Bar, MarketData, MarketService};
pub use monitor::{Monitor, MonitorRegistry};
pub use parser::InvestmentRequest;
pub use storage::{MonitorStore, Position, PositionStore};
