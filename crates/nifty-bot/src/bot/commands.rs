//! Command parsing for incoming chat messages
//!
//! Slash commands may carry a `@botname` suffix, as Telegram sends them in
//! group chats. Plain text is matched against the buy, sell and investment
//! patterns in that order.

use crate::parser::{InvestmentRequest, parse_buy, parse_investment, parse_sell};

/// Parsed command from a chat message
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Greeting
    Start,
    /// Usage
    Help,
    /// Reply with the chat id
    Id,
    /// Start monitoring this chat's positions
    Monitor,
    /// Stop monitoring
    Stop,
    /// List open positions
    Positions,
    /// Remove all of this chat's positions
    Reset,
    /// `I buy <SYMBOL>`
    Buy { symbol: String },
    /// `I sell <SYMBOL>`
    Sell { symbol: String },
    /// `₹<amount> @ <percent>%`
    Invest(InvestmentRequest),
    /// Slash command we do not know
    UnknownCommand { name: String },
    /// Text matching none of the patterns
    Unrecognised,
}

impl Command {
    /// Parse a message text; never fails
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix('/') {
            let name = rest
                .split_whitespace()
                .next()
                .and_then(|word| word.split('@').next())
                .unwrap_or_default()
                .to_lowercase();

            return match name.as_str() {
                "start" => Command::Start,
                "help" | "h" => Command::Help,
                "id" => Command::Id,
                "monitor" | "watch" => Command::Monitor,
                "stop" | "bye" | "done" => Command::Stop,
                "positions" | "pos" | "list" => Command::Positions,
                "reset" | "clear" => Command::Reset,
                _ => Command::UnknownCommand { name },
            };
        }

        if let Some(symbol) = parse_buy(input) {
            return Command::Buy { symbol };
        }
        if let Some(symbol) = parse_sell(input) {
            return Command::Sell { symbol };
        }
        match parse_investment(input) {
            Some(request) => Command::Invest(request),
            None => Command::Unrecognised,
        }
    }

    /// Usage text for `/help` and unknown commands
    pub fn help_text() -> &'static str {
        "Format: ₹<amount> @ <percent>% (e.g., ₹20000 @ 3%).
I'll recommend 5 liquid NSE/BSE stocks intraday.

Positions:
  I buy <SYMBOL>   record a buy at the current price
  I sell <SYMBOL>  forget a position
  /positions       list open positions
  /reset           clear all positions

Alerts:
  /monitor         hourly alerts at +3% / -2%
  /stop            stop alerts (also /bye, /done)

Other:
  /id              show this chat's id
  /help            this message"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slash_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse(" /ID "), Command::Id);
        assert_eq!(Command::parse("/monitor"), Command::Monitor);
        assert_eq!(Command::parse("/positions"), Command::Positions);
        assert_eq!(Command::parse("/reset"), Command::Reset);
    }

    #[test]
    fn test_parse_stop_aliases() {
        for text in ["/stop", "/bye", "/done"] {
            assert_eq!(Command::parse(text), Command::Stop);
        }
    }

    #[test]
    fn test_parse_bot_suffix() {
        assert_eq!(Command::parse("/start@NiftyNavigatorBot"), Command::Start);
        assert_eq!(Command::parse("/stop@NiftyNavigatorBot now"), Command::Stop);
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            Command::parse("/analyze TCS"),
            Command::UnknownCommand {
                name: "analyze".to_string()
            }
        );
        assert_eq!(
            Command::parse("/"),
            Command::UnknownCommand {
                name: String::new()
            }
        );
    }

    #[test]
    fn test_parse_text_commands() {
        assert_eq!(
            Command::parse("i buy tcs"),
            Command::Buy {
                symbol: "TCS".to_string()
            }
        );
        assert_eq!(
            Command::parse("I sell INFY"),
            Command::Sell {
                symbol: "INFY".to_string()
            }
        );
        assert_eq!(
            Command::parse("₹20,000 @ 3%"),
            Command::Invest(InvestmentRequest {
                amount: 20_000,
                target_percent: 3.0
            })
        );
    }

    #[test]
    fn test_parse_unrecognised() {
        assert_eq!(Command::parse("hello there"), Command::Unrecognised);
        assert_eq!(Command::parse(""), Command::Unrecognised);
        assert_eq!(Command::parse("₹20000 @ 50%"), Command::Unrecognised);
    }
}
