//! Parsing of free-text chat messages
//!
//! Recognises the investment request (`₹20,000 @ 3%`) and the position
//! commands (`I buy TCS`, `I sell TCS`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Upper bound on the intraday target accepted from users
pub const MAX_TARGET_PERCENT: f64 = 20.0;

static INVESTMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₹|\binr\b|\brs\b\.?)?\s*(\d[\d,]*)\s*@\s*(\d+(?:\.\d+)?)\s*%")
        .expect("investment pattern is valid")
});

static BUY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^I\s+buy\s+([A-Za-z.&-]+)$").expect("buy pattern is valid")
});

static SELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^I\s+sell\s+([A-Za-z.&-]+)$").expect("sell pattern is valid")
});

/// Amount to invest and intraday profit goal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRequest {
    /// Rupees
    pub amount: u64,
    /// Percent, `0 < target_percent <= 20`
    pub target_percent: f64,
}

impl InvestmentRequest {
    /// Target rendered without a trailing `.0` for whole numbers
    pub fn percent_label(&self) -> String {
        format_percent(self.target_percent)
    }
}

/// Extract an investment request from anywhere in the text
pub fn parse_investment(text: &str) -> Option<InvestmentRequest> {
    let caps = INVESTMENT_RE.captures(text)?;

    let amount: u64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let target_percent: f64 = caps.get(2)?.as_str().parse().ok()?;

    if amount == 0 || !(target_percent > 0.0 && target_percent <= MAX_TARGET_PERCENT) {
        return None;
    }

    Some(InvestmentRequest {
        amount,
        target_percent,
    })
}

/// `I buy <SYMBOL>` -> upper-cased symbol
pub fn parse_buy(text: &str) -> Option<String> {
    capture_symbol(&BUY_RE, text)
}

/// `I sell <SYMBOL>` -> upper-cased symbol
pub fn parse_sell(text: &str) -> Option<String> {
    capture_symbol(&SELL_RE, text)
}

fn capture_symbol(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text.trim())?;
    let symbol = caps.get(1)?.as_str().trim_matches('.').to_uppercase();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

/// Yahoo ticker for an NSE symbol
pub fn nse_ticker(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    if upper.ends_with(".NS") || upper.ends_with(".BO") {
        upper
    } else {
        format!("{upper}.NS")
    }
}

/// Symbol as stored and shown: NSE is implied, so only `.NS` is dropped.
/// A `.BO` suffix stays so the position keeps being priced on BSE.
pub fn display_symbol(symbol: &str) -> &str {
    symbol.strip_suffix(".NS").unwrap_or(symbol)
}

/// `3.0` -> `3`, `2.5` -> `2.5`
pub fn format_percent(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{pct:.0}")
    } else {
        let s = format!("{pct:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
