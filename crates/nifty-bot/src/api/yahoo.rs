//! Yahoo Finance client for NSE/BSE tickers

use crate::error::{BotError, Result};
use crate::market::{Bar, MarketData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

/// Yahoo Finance market data (no API key)
pub struct YahooFinanceClient {
    connector: yahoo::YahooConnector,
}

impl YahooFinanceClient {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| BotError::YahooFinanceError(e.to_string()))?;
        Ok(Self { connector })
    }
}

/// Yahoo answers unknown tickers with 404, which retrying will not fix
fn yahoo_error(ticker: &str, err: &yahoo::YahooError) -> BotError {
    let msg = err.to_string();
    if msg.contains("404") || msg.contains("Not Found") || msg.to_lowercase().contains("no data")
    {
        BotError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: msg,
        }
    } else {
        BotError::YahooFinanceError(msg)
    }
}

fn to_bar(q: &yahoo::Quote) -> Option<Bar> {
    let secs = i64::try_from(q.timestamp).ok()?;
    Some(Bar {
        timestamp: DateTime::from_timestamp(secs, 0)?,
        open: q.open,
        high: q.high,
        low: q.low,
        close: q.close,
        volume: q.volume as f64,
    })
}

#[async_trait]
impl MarketData for YahooFinanceClient {
    #[tracing::instrument(skip(self))]
    async fn latest_price(&self, ticker: &str) -> Result<f64> {
        // One-minute candles for today; the last close is the live price
        let response = self
            .connector
            .get_quote_range(ticker, "1m", "1d")
            .await
            .map_err(|e| yahoo_error(ticker, &e))?;

        let quotes = response.quotes().map_err(|e| yahoo_error(ticker, &e))?;
        quotes
            .iter()
            .rev()
            .map(|q| q.close)
            .find(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| BotError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "no intraday quotes".to_string(),
            })
    }

    #[tracing::instrument(skip(self))]
    async fn daily_bars(&self, ticker: &str, days: u32) -> Result<Vec<Bar>> {
        let end = Utc::now();
        let start = end - chrono::Duration::days(i64::from(days));

        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| BotError::YahooFinanceError(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| BotError::YahooFinanceError(format!("Invalid end timestamp: {e}")))?;

        let response = self
            .connector
            .get_quote_history(ticker, start_odt, end_odt)
            .await
            .map_err(|e| yahoo_error(ticker, &e))?;

        let quotes = response.quotes().map_err(|e| yahoo_error(ticker, &e))?;
        Ok(quotes.iter().filter_map(to_bar).collect())
    }

    fn name(&self) -> &'static str {
        "Yahoo Finance"
    }
}
