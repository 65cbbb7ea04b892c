//! ATR and volume screening for recommended picks

use crate::config::LiquidityThresholds;
use crate::error::{BotError, Result};
use crate::market::Bar;
use ta::Next;
use ta::indicators::{AverageTrueRange, SimpleMovingAverage};

/// Latest ATR over `period` bars
pub fn average_true_range(bars: &[Bar], period: usize) -> Result<f64> {
    let mut atr =
        AverageTrueRange::new(period).map_err(|e| BotError::IndicatorError(e.to_string()))?;
    let mut value = None;
    for bar in bars {
        value = Some(atr.next(bar));
    }
    value.ok_or_else(|| BotError::IndicatorError("ATR needs at least one bar".to_string()))
}

/// Mean volume over the last `period` bars
pub fn average_volume(bars: &[Bar], period: usize) -> Result<f64> {
    let mut sma =
        SimpleMovingAverage::new(period).map_err(|e| BotError::IndicatorError(e.to_string()))?;
    let mut value = None;
    for bar in bars {
        value = Some(sma.next(bar.volume));
    }
    value.ok_or_else(|| BotError::IndicatorError("volume average needs at least one bar".into()))
}

/// Outcome of screening one pick
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    /// ATR% below what the target needs
    LowVolatility,
    /// Average volume under the minimum
    LowVolume,
    /// Fewer bars than the ATR window needs
    InsufficientData,
    /// Market data could not be fetched
    Unavailable(String),
}

/// Screening result for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityCheck {
    pub symbol: String,
    pub verdict: Verdict,
    pub atr_percent: Option<f64>,
    pub required_atr_percent: f64,
    pub avg_volume: Option<f64>,
    pub sessions: usize,
}

impl LiquidityCheck {
    /// Screen `bars` (oldest first) against the target move
    pub fn evaluate(
        symbol: &str,
        bars: &[Bar],
        target_percent: f64,
        thresholds: &LiquidityThresholds,
    ) -> Result<Self> {
        let required = target_percent * thresholds.atr_multiple;
        let mut check = Self {
            symbol: symbol.to_string(),
            verdict: Verdict::InsufficientData,
            atr_percent: None,
            required_atr_percent: required,
            avg_volume: None,
            sessions: bars.len(),
        };

        if bars.len() <= thresholds.atr_period {
            return Ok(check);
        }

        let atr = average_true_range(bars, thresholds.atr_period)?;
        let avg_volume = average_volume(bars, thresholds.volume_period)?;
        let last_close = bars.last().map_or(0.0, |b| b.close);
        if last_close <= 0.0 {
            return Ok(check);
        }

        let atr_percent = atr / last_close * 100.0;
        check.atr_percent = Some(atr_percent);
        check.avg_volume = Some(avg_volume);

        check.verdict = if atr_percent < required {
            Verdict::LowVolatility
        } else if avg_volume < thresholds.min_avg_volume {
            Verdict::LowVolume
        } else {
            Verdict::Pass
        };

        tracing::debug!(
            symbol,
            atr_percent,
            avg_volume,
            verdict = ?check.verdict,
            "liquidity check"
        );
        Ok(check)
    }

    /// Check for a symbol whose data could not be loaded
    pub fn unavailable(
        symbol: &str,
        reason: impl Into<String>,
        target_percent: f64,
        thresholds: &LiquidityThresholds,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            verdict: Verdict::Unavailable(reason.into()),
            atr_percent: None,
            required_atr_percent: target_percent * thresholds.atr_multiple,
            avg_volume: None,
            sessions: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// One bullet for the advice message
    pub fn line(&self) -> String {
        let sym = &self.symbol;
        let atr = self.atr_percent.unwrap_or_default();
        let vol = format_volume(self.avg_volume.unwrap_or_default());
        match &self.verdict {
            Verdict::Pass => format!(
                "✅ {sym}: ATR {atr:.2}% (needs {:.2}%), avg vol {vol}",
                self.required_atr_percent
            ),
            Verdict::LowVolatility => format!(
                "⚠️ {sym}: ATR {atr:.2}% below {:.2}% needed",
                self.required_atr_percent
            ),
            Verdict::LowVolume => format!("⚠️ {sym}: thin volume, avg {vol}"),
            Verdict::InsufficientData => {
                format!("⚠️ {sym}: only {} sessions of history", self.sessions)
            }
            Verdict::Unavailable(_) => format!("⚠️ {sym}: no market data"),
        }
    }
}

/// Shares in lakh / crore
pub fn format_volume(volume: f64) -> String {
    if volume >= 1e7 {
        format!("{:.2}Cr", volume / 1e7)
    } else if volume >= 1e5 {
        format!("{:.1}L", volume / 1e5)
    } else {
        format!("{volume:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::bar;

    fn series(n: usize, range: f64, close: f64, volume: f64) -> Vec<Bar> {
        (0..n)
            .map(|i| bar(i as i64, close + range / 2.0, close - range / 2.0, close, volume))
            .collect()
    }

    #[test]
    fn test_atr_constant_range() {
        // Flat closes with a fixed high-low range: true range equals that range
        let bars = series(30, 4.0, 100.0, 1e6);
        let atr = average_true_range(&bars, 14).unwrap();
        assert!((atr - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_rejects_zero_period() {
        assert!(average_true_range(&series(5, 1.0, 10.0, 1.0), 0).is_err());
    }

    #[test]
    fn test_average_volume_window() {
        let mut bars = series(10, 1.0, 10.0, 100.0);
        bars.extend(series(5, 1.0, 10.0, 400.0));
        let avg = average_volume(&bars, 5).unwrap();
        assert!((avg - 400.0).abs() < 1e-9);
        assert!(average_volume(&[], 5).is_err());
    }

    #[test]
    fn test_pass() {
        // ATR 4% of price, target 3% * 0.5 = 1.5% needed
        let bars = series(30, 4.0, 100.0, 2_000_000.0);
        let check = LiquidityCheck::evaluate("TCS", &bars, 3.0, &LiquidityThresholds::default())
            .unwrap();
        assert_eq!(check.verdict, Verdict::Pass);
        assert!(check.passed());
        assert!(check.line().starts_with("✅ TCS: ATR 4.00%"));
    }

    #[test]
    fn test_low_volatility() {
        let bars = series(30, 0.5, 100.0, 2_000_000.0);
        let check = LiquidityCheck::evaluate("ITC", &bars, 3.0, &LiquidityThresholds::default())
            .unwrap();
        assert_eq!(check.verdict, Verdict::LowVolatility);
        assert_eq!(check.line(), "⚠️ ITC: ATR 0.50% below 1.50% needed");
    }

    #[test]
    fn test_low_volume() {
        let bars = series(30, 4.0, 100.0, 10_000.0);
        let check = LiquidityCheck::evaluate("SMALL", &bars, 3.0, &LiquidityThresholds::default())
            .unwrap();
        assert_eq!(check.verdict, Verdict::LowVolume);
        assert!(!check.passed());
    }

    #[test]
    fn test_insufficient_data() {
        let bars = series(14, 4.0, 100.0, 2_000_000.0);
        let check = LiquidityCheck::evaluate("NEW", &bars, 3.0, &LiquidityThresholds::default())
            .unwrap();
        assert_eq!(check.verdict, Verdict::InsufficientData);
        assert_eq!(check.line(), "⚠️ NEW: only 14 sessions of history");
    }

    #[test]
    fn test_unavailable_line() {
        let check =
            LiquidityCheck::unavailable("GONE", "404", 2.0, &LiquidityThresholds::default());
        assert_eq!(check.line(), "⚠️ GONE: no market data");
        assert!(!check.passed());
    }

    #[test]
    fn test_format_volume() {
        assert_eq!(format_volume(950.0), "950");
        assert_eq!(format_volume(250_000.0), "2.5L");
        assert_eq!(format_volume(32_000_000.0), "3.20Cr");
    }
}
