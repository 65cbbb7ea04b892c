//! Market data abstraction
//!
//! [`MarketData`] is implemented by the raw provider clients in [`crate::api`]
//! and by [`MarketService`], which adds NSE ticker mapping, caching and
//! retries on top of a provider. The advisor and monitor only see the trait.

use crate::cache::{CacheKey, MarketCache};
use crate::error::{BotError, Result};
use crate::parser::nse_ticker;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl ta::Open for Bar {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Bar {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Source of prices for NSE/BSE tickers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent traded price
    async fn latest_price(&self, ticker: &str) -> Result<f64>;

    /// Daily bars covering roughly the last `days` calendar days, oldest first
    async fn daily_bars(&self, ticker: &str, days: u32) -> Result<Vec<Bar>>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Drop bars with unusable closes and sort oldest first
pub fn clean_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.retain(|b| {
        b.close.is_finite() && b.close > 0.0 && b.high.is_finite() && b.low.is_finite()
    });
    bars.sort_by_key(|b| b.timestamp);
    bars
}

/// Provider wrapper used by the bot
pub struct MarketService {
    provider: Arc<dyn MarketData>,
    quotes: MarketCache<f64>,
    bars: MarketCache<Vec<Bar>>,
    retry: RetryPolicy,
}

impl MarketService {
    pub fn new(provider: Arc<dyn MarketData>, quote_ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            provider,
            quotes: MarketCache::new(quote_ttl),
            // Daily bars only change once per session
            bars: MarketCache::new(Duration::from_secs(15 * 60)),
            retry,
        }
    }
}

#[async_trait]
impl MarketData for MarketService {
    async fn latest_price(&self, symbol: &str) -> Result<f64> {
        let ticker = nse_ticker(symbol);
        let provider = Arc::clone(&self.provider);

        self.quotes
            .get_or_fetch(CacheKey::quote(&ticker), || async {
                let price = self
                    .retry
                    .execute("latest_price", || provider.latest_price(&ticker))
                    .await?;
                if price.is_finite() && price > 0.0 {
                    Ok(price)
                } else {
                    Err(BotError::DataUnavailable {
                        symbol: ticker.clone(),
                        reason: format!("{} returned price {price}", provider.name()),
                    })
                }
            })
            .await
    }

    async fn daily_bars(&self, symbol: &str, days: u32) -> Result<Vec<Bar>> {
        let ticker = nse_ticker(symbol);
        let provider = Arc::clone(&self.provider);

        self.bars
            .get_or_fetch(CacheKey::daily(&ticker, days), || async {
                let bars = self
                    .retry
                    .execute("daily_bars", || provider.daily_bars(&ticker, days))
                    .await?;
                let bars = clean_bars(bars);
                if bars.is_empty() {
                    return Err(BotError::DataUnavailable {
                        symbol: ticker.clone(),
                        reason: "no daily history".to_string(),
                    });
                }
                Ok(bars)
            })
            .await
    }

    fn name(&self) -> &'static str {
        self.provider.name()
    }
}

#[cfg(test)]
pub(crate) fn bar(day: i64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: DateTime::from_timestamp(1_700_000_000 + day * 86_400, 0).unwrap(),
        open: close,
        high,
        low,
        close,
        volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service(mock: MockMarketData) -> MarketService {
        MarketService::new(Arc::new(mock), Duration::from_secs(60), RetryPolicy::fast())
    }

    #[test]
    fn test_clean_bars_drops_bad_closes_and_sorts() {
        let bars = vec![
            bar(2, 11.0, 9.0, 10.0, 100.0),
            bar(1, 11.0, 9.0, f64::NAN, 100.0),
            bar(0, 11.0, 9.0, 10.5, 100.0),
            bar(3, 11.0, 9.0, 0.0, 100.0),
        ];
        let cleaned = clean_bars(bars);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].close, 10.5);
        assert_eq!(cleaned[1].close, 10.0);
    }

    #[tokio::test]
    async fn test_latest_price_maps_ticker_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut mock = MockMarketData::new();
        mock.expect_latest_price().returning(move |ticker| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(ticker, "TCS.NS");
            Ok(3890.25)
        });
        mock.expect_name().returning(|| "mock");

        let svc = service(mock);
        assert_eq!(svc.latest_price("TCS").await.unwrap(), 3890.25);
        assert_eq!(svc.latest_price("tcs").await.unwrap(), 3890.25);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_latest_price_retries_transient_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut mock = MockMarketData::new();
        mock.expect_latest_price().returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BotError::YahooFinanceError("timeout".to_string()))
            } else {
                Ok(512.0)
            }
        });
        mock.expect_name().returning(|| "mock");

        let svc = service(mock);
        assert_eq!(svc.latest_price("SBIN").await.unwrap(), 512.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_price_is_unavailable() {
        let mut mock = MockMarketData::new();
        mock.expect_latest_price().returning(|_| Ok(0.0));
        mock.expect_name().returning(|| "mock");

        let err = service(mock).latest_price("XYZ").await.unwrap_err();
        assert!(matches!(err, BotError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_daily_bars_empty_is_unavailable() {
        let mut mock = MockMarketData::new();
        mock.expect_daily_bars()
            .returning(|_, _| Ok(vec![bar(0, 1.0, 1.0, -1.0, 10.0)]));
        mock.expect_name().returning(|| "mock");

        let err = service(mock).daily_bars("XYZ", 60).await.unwrap_err();
        assert!(matches!(err, BotError::DataUnavailable { .. }));
    }
}
