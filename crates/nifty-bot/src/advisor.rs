//! Turns an investment request into the recommendation reply
//!
//! Flow: agent #1 suggests picks, each pick is screened on ATR and volume,
//! agent #2 gives a yes/no sanity check, and the first pick that passed
//! screening becomes the top suggestion.

use crate::agents::{RecommendationAgent, ValidationAgent, ValidationInput};
use crate::config::LiquidityThresholds;
use crate::error::Result;
use crate::indicators::LiquidityCheck;
use crate::market::MarketData;
use crate::parser::InvestmentRequest;
use futures::future::join_all;
use nifty_core::{Agent, Context};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Reply when agent #1 fails
pub const RECOMMENDATION_FAILED: &str = "⚠️ Sorry, couldn't fetch recommendations. Try again later.";

const SANITY_SKIPPED: &str = "🔍 Sanity check: skipped (service limit)";
const MAX_SANITY_LINES: usize = 5;
const MAX_SYMBOL_LEN: usize = 20;

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+\s*[.)]|[-*•])\s*").expect("list marker pattern is valid")
});

static PAREN_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?:(?:NSE|BSE)\s*:\s*)?([A-Z][A-Z0-9&-]*)(?:\.(?:NS|BO))?\)")
        .expect("parenthesised symbol pattern is valid")
});

/// One recommended stock
#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub symbol: String,
    /// The model's line with list markers and bold removed
    pub line: String,
}

fn clean_line(line: &str) -> String {
    let line = line.trim().replace("**", "").replace("__", "");
    LIST_MARKER.replace(line.trim(), "").trim().to_string()
}

fn is_valid_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && s.len() <= MAX_SYMBOL_LEN
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '&' || c == '-')
}

fn strip_exchange(s: &str) -> &str {
    s.strip_suffix(".NS")
        .or_else(|| s.strip_suffix(".BO"))
        .unwrap_or(s)
}

/// Words models put before a colon that are never tickers
const LABEL_WORDS: &[&str] = &[
    "CAUTION",
    "DISCLAIMER",
    "ENTRY",
    "EXIT",
    "IMPORTANT",
    "NOTE",
    "PICK",
    "PICKS",
    "REASON",
    "RATIONALE",
    "RISK",
    "SECTOR",
    "STOP",
    "STOPLOSS",
    "SUMMARY",
    "TARGET",
    "TIP",
    "WARNING",
    "WHY",
];

/// Text before the first rationale separator
fn head(line: &str) -> &str {
    ["–", "—", " - ", ":"]
        .iter()
        .filter_map(|sep| line.find(sep))
        .min()
        .map_or(line, |idx| &line[..idx])
        .trim()
}

/// A ticker exactly as the model wrote it, e.g. `TCS`, `INFY.NS`, `M&M`
fn as_ticker(token: &str) -> Option<String> {
    let token = token.trim_matches(|c: char| matches!(c, ',' | ';' | '.' | '*' | '`'));
    let sym = strip_exchange(token);
    (is_valid_symbol(sym) && !LABEL_WORDS.contains(&sym)).then(|| sym.to_string())
}

fn symbol_from_line(line: &str) -> Option<String> {
    let head = head(line);
    // `TCS (Tata Consultancy Services) – ...` names the ticker first
    let lead = head.split(" (").next().unwrap_or(head).trim();
    let mut words = lead.split_whitespace();
    let single = match (words.next(), words.next()) {
        (Some(word), None) => Some(word),
        _ => None,
    };
    if let Some(sym) = single.and_then(as_ticker) {
        return Some(sym);
    }

    // `Reliance Industries (RELIANCE) – ...` or `Tata Motors (NSE: TATAMOTORS)`
    let caps = PAREN_SYMBOL.captures(line)?;
    let sym = caps.get(1)?.as_str();
    (is_valid_symbol(sym) && !LABEL_WORDS.contains(&sym)).then(|| sym.to_string())
}

/// Extract up to `max` distinct picks from the model reply
pub fn parse_picks(text: &str, max: usize) -> Vec<Pick> {
    let mut seen = HashSet::new();
    text.lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let symbol = symbol_from_line(&line)?;
            seen.insert(symbol.clone()).then_some(Pick { symbol, line })
        })
        .take(max)
        .collect()
}

/// Everything needed to render the recommendation reply
#[derive(Debug, Clone)]
pub struct Advice {
    pub request: InvestmentRequest,
    pub picks: Vec<Pick>,
    /// Used when no line of the reply yielded a symbol
    pub raw_lines: Vec<String>,
    pub checks: Vec<LiquidityCheck>,
    /// `None` when the sanity check failed
    pub sanity: Option<Vec<String>>,
    pub top: Option<String>,
}

impl Advice {
    pub fn render(&self) -> String {
        let lines: Vec<&str> = if self.picks.is_empty() {
            self.raw_lines.iter().map(String::as_str).collect()
        } else {
            self.picks.iter().map(|p| p.line.as_str()).collect()
        };

        let noun = if lines.len() == 1 { "pick" } else { "picks" };
        let mut out = format!(
            "📈 {} {noun} for ₹{} @ {}%:\n",
            lines.len(),
            self.request.amount,
            self.request.percent_label()
        );
        for (i, line) in lines.iter().enumerate() {
            out.push_str(&format!("{}. {line}\n", i + 1));
        }
        out.push('\n');

        if !self.checks.is_empty() {
            out.push_str("📊 Liquidity check:\n");
            for check in &self.checks {
                out.push_str(&format!("• {}\n", check.line()));
            }
            out.push('\n');
        }

        if !self.picks.is_empty() {
            match &self.sanity {
                Some(sanity) => {
                    out.push_str("🔍 Sanity check:\n");
                    for line in sanity {
                        out.push_str(&format!("• {line}\n"));
                    }
                }
                None => {
                    out.push_str(SANITY_SKIPPED);
                    out.push('\n');
                }
            }
            out.push('\n');
        }

        if let Some(top) = &self.top {
            out.push_str(&format!("⭐️ Top suggestion: {top}"));
        }

        out.trim_end().to_string()
    }
}

/// Runs the two-agent recommendation flow
pub struct Advisor {
    recommender: RecommendationAgent,
    validator: ValidationAgent,
    market: Arc<dyn MarketData>,
    liquidity: LiquidityThresholds,
    max_picks: usize,
}

impl Advisor {
    pub fn new(
        recommender: RecommendationAgent,
        validator: ValidationAgent,
        market: Arc<dyn MarketData>,
        liquidity: LiquidityThresholds,
        max_picks: usize,
    ) -> Self {
        Self {
            recommender,
            validator,
            market,
            liquidity,
            max_picks,
        }
    }

    /// How many picks agent #1 is asked for
    pub fn pick_count(&self) -> usize {
        self.max_picks
    }

    /// Fails only when agent #1 fails
    pub async fn advise(
        &self,
        request: &InvestmentRequest,
        context: &mut Context,
    ) -> Result<Advice> {
        tracing::debug!(agent = self.recommender.name(), user = ?context.user_name(), "asking");
        let reply = self
            .recommender
            .process(serde_json::to_string(request)?, context)
            .await?;
        let picks = parse_picks(&reply, self.max_picks);

        if picks.is_empty() {
            tracing::warn!("no symbols recognised in recommendation reply");
            let raw_lines: Vec<String> = reply
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            let top = raw_lines.first().map(|l| head(l).to_string());
            return Ok(Advice {
                request: *request,
                picks,
                raw_lines,
                checks: Vec::new(),
                sanity: None,
                top,
            });
        }

        let checks = self.screen(&picks, request.target_percent).await;
        let sanity = self.sanity_check(&picks, request, context).await;

        let top = checks
            .iter()
            .find(|c| c.passed())
            .map(|c| c.symbol.clone())
            .or_else(|| picks.first().map(|p| p.symbol.clone()));

        Ok(Advice {
            request: *request,
            picks,
            raw_lines: Vec::new(),
            checks,
            sanity,
            top,
        })
    }

    async fn screen(&self, picks: &[Pick], target_percent: f64) -> Vec<LiquidityCheck> {
        let checks = picks.iter().map(|pick| async move {
            match self
                .market
                .daily_bars(&pick.symbol, self.liquidity.history_days)
                .await
            {
                Ok(bars) => {
                    LiquidityCheck::evaluate(&pick.symbol, &bars, target_percent, &self.liquidity)
                        .unwrap_or_else(|e| {
                            LiquidityCheck::unavailable(
                                &pick.symbol,
                                e.to_string(),
                                target_percent,
                                &self.liquidity,
                            )
                        })
                }
                Err(e) => {
                    tracing::warn!(symbol = %pick.symbol, error = %e, "history unavailable");
                    LiquidityCheck::unavailable(
                        &pick.symbol,
                        e.to_string(),
                        target_percent,
                        &self.liquidity,
                    )
                }
            }
        });
        join_all(checks).await
    }

    async fn sanity_check(
        &self,
        picks: &[Pick],
        request: &InvestmentRequest,
        context: &mut Context,
    ) -> Option<Vec<String>> {
        let input = ValidationInput {
            symbols: picks.iter().map(|p| p.symbol.clone()).collect(),
            target_percent: request.target_percent,
        };

        let result = match serde_json::to_string(&input) {
            Ok(json) => self.validator.process(json, context).await,
            Err(e) => Err(nifty_core::Error::InvalidInput(e.to_string())),
        };
        match result {
            Ok(reply) => Some(
                reply
                    .lines()
                    .map(clean_line)
                    .filter(|l| !l.is_empty())
                    .take(MAX_SANITY_LINES)
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "sanity check skipped");
                None
            }
        }
    }
}
