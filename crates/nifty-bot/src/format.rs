//! User-facing reply texts

use crate::monitor::ist;
use crate::parser::{InvestmentRequest, display_symbol};
use crate::storage::Position;
use std::time::Duration;

pub const WELCOME: &str =
    "👋 Welcome to NiftyNavigator!\nSend: ₹<amount> @ <percent>% (e.g., ₹20000 @ 3%)";

pub const PARSE_ERROR: &str = "❌ Couldn't parse input. Use: ₹<amount> @ <percent>%";

pub const MONITORING_STOPPED: &str = "🛑 Monitoring stopped.";

pub const MONITORING_ALREADY_ON: &str = "📊 Monitoring is already on.";

pub const INTERNAL_ERROR: &str = "⚠️ Something went wrong. Try again later.";

const NO_POSITIONS: &str = "📭 No open positions. Record one with: I buy <SYMBOL>";

pub fn chat_id(chat_id: i64) -> String {
    format!("🆔 Your Telegram chat ID is:\n`{chat_id}`")
}

pub fn received(request: &InvestmentRequest, picks: usize) -> String {
    format!(
        "✅ Received: ₹{}, target: {}%\nFetching top {picks} picks...",
        request.amount,
        request.percent_label()
    )
}

pub fn recorded(symbol: &str, price: f64) -> String {
    format!("✅ Recorded {symbol} at ₹{price:.2}. I'll watch this position!")
}

/// Hint appended after a buy when the chat has no monitor running
pub const MONITOR_HINT: &str = "Send /monitor to get price alerts.";

pub fn price_unavailable(symbol: &str) -> String {
    format!("⚠️ Couldn't fetch price for {symbol}. Check symbol and try again.")
}

pub fn removed(symbol: &str, count: usize) -> String {
    match count {
        0 => format!("⚠️ No open position in {symbol}."),
        1 => format!("🗑️ Removed your {symbol} position."),
        n => format!("🗑️ Removed {n} {symbol} positions."),
    }
}

pub fn cleared(count: usize) -> String {
    match count {
        0 => "📭 Nothing to clear.".to_string(),
        1 => "🧹 Cleared 1 position.".to_string(),
        n => format!("🧹 Cleared {n} positions."),
    }
}

pub fn monitoring_started(interval: Duration) -> String {
    format!("📊 Monitoring started. Alerts every {}.", every(interval))
}

/// "1 hour", "2 hours", "30 minutes"
fn every(interval: Duration) -> String {
    let secs = interval.as_secs();
    let (n, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else {
        (secs.div_ceil(60).max(1), "minute")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

pub fn positions(positions: &[Position]) -> String {
    if positions.is_empty() {
        return NO_POSITIONS.to_string();
    }

    let mut out = String::from("📒 Open positions:");
    for (i, p) in positions.iter().enumerate() {
        let since = p.timestamp.with_timezone(&ist()).format("%d %b %H:%M");
        out.push_str(&format!(
            "\n{}. {} @ ₹{:.2} (since {since} IST)",
            i + 1,
            display_symbol(&p.symbol),
            p.entry_price
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_received() {
        let req = InvestmentRequest {
            amount: 20_000,
            target_percent: 2.5,
        };
        assert_eq!(
            received(&req, 5),
            "✅ Received: ₹20000, target: 2.5%\nFetching top 5 picks..."
        );
    }

    #[test]
    fn test_every() {
        assert_eq!(every(Duration::from_secs(3600)), "1 hour");
        assert_eq!(every(Duration::from_secs(7200)), "2 hours");
        assert_eq!(every(Duration::from_secs(1800)), "30 minutes");
        assert_eq!(every(Duration::from_secs(60)), "1 minute");
        assert_eq!(
            monitoring_started(Duration::from_secs(3600)),
            "📊 Monitoring started. Alerts every 1 hour."
        );
    }

    #[test]
    fn test_positions_list() {
        assert_eq!(positions(&[]), NO_POSITIONS);

        let mut p = Position::new(1, "TCS", 3890.5);
        p.timestamp = Utc.with_ymd_and_hms(2024, 6, 3, 4, 0, 0).unwrap();
        assert_eq!(
            positions(&[p]),
            "📒 Open positions:\n1. TCS @ ₹3890.50 (since 03 Jun 09:30 IST)"
        );
    }

    #[test]
    fn test_removed_and_cleared() {
        assert_eq!(removed("TCS", 0), "⚠️ No open position in TCS.");
        assert_eq!(removed("TCS", 2), "🗑️ Removed 2 TCS positions.");
        assert_eq!(cleared(1), "🧹 Cleared 1 position.");
    }
}
