//! Alpha Vantage client
//!
//! Indian equities are listed under the `.BSE` suffix, so `TCS.NS` and
//! `TCS.BO` are both queried as `TCS.BSE`.

use crate::error::{BotError, Result};
use crate::market::{Bar, MarketData};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl AlphaVantageClient {
    /// Create a client allowing `rate_limit` requests per minute (free tier: 5)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn query(&self, function: &str, symbol: &str) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let params = [
            ("function", function),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];
        let response = self.client.get(BASE_URL).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(BotError::AlphaVantageError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let data: Value = response.json().await?;
        check_error(symbol, data)
    }
}

fn av_symbol(ticker: &str) -> String {
    let base = ticker
        .strip_suffix(".NS")
        .or_else(|| ticker.strip_suffix(".BO"))
        .unwrap_or(ticker);
    format!("{base}.BSE")
}

fn check_error(symbol: &str, data: Value) -> Result<Value> {
    if let Some(error) = data.get("Error Message") {
        return Err(BotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: error.as_str().unwrap_or("unknown symbol").to_string(),
        });
    }

    // Free-tier throttling arrives as a 200 with a "Note" body, or an
    // "Information" body that mentions the call frequency. Other
    // "Information" bodies (premium endpoint, bad key) are permanent.
    if let Some(info) = data.get("Information").and_then(Value::as_str) {
        if data.get("Note").is_none() && !is_rate_limit_notice(info) {
            return Err(BotError::AlphaVantageError(info.to_string()));
        }
    }
    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(BotError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
            retry_after: Some(Duration::from_secs(60)),
        });
    }

    Ok(data)
}

fn is_rate_limit_notice(info: &str) -> bool {
    let info = info.to_lowercase();
    ["call frequency", "rate limit", "requests per", "calls per"]
        .iter()
        .any(|needle| info.contains(needle))
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key)?.as_str()?.trim().parse().ok()
}

fn parse_global_quote(symbol: &str, data: &Value) -> Result<f64> {
    data.get("Global Quote")
        .and_then(|q| number(q, "05. price"))
        .ok_or_else(|| BotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "empty global quote".to_string(),
        })
}

fn parse_daily(symbol: &str, data: &Value, since: NaiveDate) -> Result<Vec<Bar>> {
    let series = data
        .get("Time Series (Daily)")
        .and_then(Value::as_object)
        .ok_or_else(|| BotError::AlphaVantageError(format!("No daily data for {symbol}")))?;

    let bars = series
        .iter()
        .filter_map(|(date, values)| {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            if day < since {
                return None;
            }
            Some(Bar {
                timestamp: day.and_hms_opt(0, 0, 0)?.and_utc(),
                open: number(values, "1. open")?,
                high: number(values, "2. high")?,
                low: number(values, "3. low")?,
                close: number(values, "4. close")?,
                volume: number(values, "5. volume")?,
            })
        })
        .collect();

    Ok(bars)
}

#[async_trait]
impl MarketData for AlphaVantageClient {
    #[tracing::instrument(skip(self))]
    async fn latest_price(&self, ticker: &str) -> Result<f64> {
        let symbol = av_symbol(ticker);
        let data = self.query("GLOBAL_QUOTE", &symbol).await?;
        parse_global_quote(&symbol, &data)
    }

    #[tracing::instrument(skip(self))]
    async fn daily_bars(&self, ticker: &str, days: u32) -> Result<Vec<Bar>> {
        let symbol = av_symbol(ticker);
        let data = self.query("TIME_SERIES_DAILY", &symbol).await?;
        let since = (Utc::now() - chrono::Duration::days(i64::from(days))).date_naive();
        parse_daily(&symbol, &data, since)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_av_symbol() {
        assert_eq!(av_symbol("TCS.NS"), "TCS.BSE");
        assert_eq!(av_symbol("SBIN.BO"), "SBIN.BSE");
        assert_eq!(av_symbol("INFY"), "INFY.BSE");
    }

    #[test]
    fn test_check_error_variants() {
        let err = check_error("X.BSE", json!({"Error Message": "Invalid API call"})).unwrap_err();
        assert!(matches!(err, BotError::DataUnavailable { .. }));

        let err = check_error("X.BSE", json!({"Note": "5 calls per minute"})).unwrap_err();
        assert!(matches!(
            err,
            BotError::RateLimitExceeded {
                retry_after: Some(_),
                ..
            }
        ));
        assert!(err.is_transient());

        let err = check_error(
            "X.BSE",
            json!({"Information": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}),
        )
        .unwrap_err();
        assert!(matches!(err, BotError::RateLimitExceeded { .. }));

        assert!(check_error("X.BSE", json!({"Global Quote": {}})).is_ok());
    }

    #[test]
    fn test_permanent_information_is_not_retried() {
        let err = check_error(
            "X.BSE",
            json!({"Information": "This is a premium endpoint. Subscribe to any of the premium plans."}),
        )
        .unwrap_err();
        assert!(matches!(err, BotError::AlphaVantageError(ref msg) if msg.contains("premium")));
        assert!(!err.is_transient());

        let err = check_error("X.BSE", json!({"Information": "The **demo** API key is for demo purposes only."}))
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_global_quote() {
        let data = json!({
            "Global Quote": {
                "01. symbol": "TCS.BSE",
                "05. price": "3901.4500",
            }
        });
        assert_eq!(parse_global_quote("TCS.BSE", &data).unwrap(), 3901.45);
        assert!(parse_global_quote("TCS.BSE", &json!({"Global Quote": {}})).is_err());
    }

    #[test]
    fn test_parse_daily_filters_old_and_malformed_rows() {
        let data = json!({
            "Time Series (Daily)": {
                "2024-05-03": {
                    "1. open": "100.0", "2. high": "104.0", "3. low": "99.0",
                    "4. close": "103.0", "5. volume": "1200000"
                },
                "2024-05-02": {
                    "1. open": "98.0", "2. high": "101.0", "3. low": "97.5",
                    "4. close": "100.0", "5. volume": "900000"
                },
                "2024-05-01": {
                    "1. open": "bad", "2. high": "101.0", "3. low": "97.5",
                    "4. close": "100.0", "5. volume": "900000"
                },
                "2024-01-01": {
                    "1. open": "90.0", "2. high": "91.0", "3. low": "89.0",
                    "4. close": "90.5", "5. volume": "500000"
                }
            }
        });
        let since = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let mut bars = parse_daily("TCS.BSE", &data, since).unwrap();
        bars.sort_by_key(|b| b.timestamp);

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.0);
        assert_eq!(bars[1].volume, 1_200_000.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access and ALPHA_VANTAGE_API_KEY
    async fn test_latest_price_live() {
        let key = std::env::var("ALPHA_VANTAGE_API_KEY").unwrap();
        let client = AlphaVantageClient::new(key, 5);
        assert!(client.latest_price("RELIANCE.NS").await.unwrap() > 0.0);
    }
}
