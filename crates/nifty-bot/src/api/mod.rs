//! Clients for the external services the bot talks to

pub mod alpha_vantage;
pub mod telegram;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageClient;
pub use telegram::{Messenger, ParseMode, TelegramClient, Update};
pub use yahoo::YahooFinanceClient;
