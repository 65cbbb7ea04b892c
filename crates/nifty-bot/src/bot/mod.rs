//! Telegram dispatcher
//!
//! [`NiftyBot`] turns each incoming message into a [`Command`] and answers it
//! through a [`Messenger`]. [`NiftyBot::run`] long-polls Telegram and handles
//! every update in its own task, so a slow recommendation never blocks other
//! chats.

pub mod commands;

pub use commands::Command;

use crate::advisor::{Advisor, RECOMMENDATION_FAILED};
use crate::api::telegram::{Messenger, ParseMode, TelegramClient, Update};
use crate::error::{BotError, Result};
use crate::format;
use crate::market::MarketData;
use crate::monitor::MonitorRegistry;
use crate::parser::{InvestmentRequest, display_symbol};
use crate::storage::PositionStore;
use nifty_core::Context;
use std::sync::Arc;
use std::time::Duration;

/// Pause after a failed `getUpdates` without a server-supplied delay
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// NiftyNavigator bot
pub struct NiftyBot {
    messenger: Arc<dyn Messenger>,
    advisor: Arc<Advisor>,
    market: Arc<dyn MarketData>,
    positions: Arc<PositionStore>,
    registry: Arc<MonitorRegistry>,
}

impl NiftyBot {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        advisor: Arc<Advisor>,
        market: Arc<dyn MarketData>,
        positions: Arc<PositionStore>,
        registry: Arc<MonitorRegistry>,
    ) -> Self {
        Self {
            messenger,
            advisor,
            market,
            positions,
            registry,
        }
    }

    /// Answer one message from `chat_id`
    pub async fn handle(&self, chat_id: i64, text: &str) -> Result<()> {
        self.dispatch(chat_id, Context::new().with_chat_id(chat_id), text).await
    }

    #[tracing::instrument(skip_all, fields(chat_id = chat_id, user = context.user_name()))]
    async fn dispatch(&self, chat_id: i64, context: Context, text: &str) -> Result<()> {
        let command = Command::parse(text);
        tracing::debug!(?command, "command parsed");

        match command {
            Command::Start => self.reply(chat_id, format::WELCOME).await,
            Command::Help => self.reply(chat_id, Command::help_text()).await,
            Command::UnknownCommand { name } => {
                tracing::debug!(command = %name, "unknown command");
                self.reply(chat_id, Command::help_text()).await
            }
            Command::Id => {
                self.messenger
                    .send_formatted(chat_id, &format::chat_id(chat_id), ParseMode::Markdown)
                    .await
            }
            Command::Monitor => {
                let text = if self.registry.start(chat_id).await? {
                    format::monitoring_started(self.registry.poll_interval())
                } else {
                    format::MONITORING_ALREADY_ON.to_string()
                };
                self.reply(chat_id, &text).await
            }
            Command::Stop => {
                self.registry.stop(chat_id).await?;
                self.reply(chat_id, format::MONITORING_STOPPED).await
            }
            Command::Positions => {
                let positions = self.positions.positions_for(chat_id).await;
                self.reply(chat_id, &format::positions(&positions)).await
            }
            Command::Reset => {
                let cleared = self.positions.clear(chat_id).await?;
                tracing::info!(chat_id, cleared, "positions reset");
                self.reply(chat_id, &format::cleared(cleared)).await
            }
            Command::Buy { symbol } => self.buy(chat_id, display_symbol(&symbol)).await,
            Command::Sell { symbol } => {
                let symbol = display_symbol(&symbol);
                let removed = self.positions.remove_symbol(chat_id, symbol).await?;
                self.reply(chat_id, &format::removed(symbol, removed)).await
            }
            Command::Invest(request) => self.invest(chat_id, context, &request).await,
            Command::Unrecognised => self.reply(chat_id, format::PARSE_ERROR).await,
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.messenger.send_text(chat_id, text).await
    }

    async fn buy(&self, chat_id: i64, symbol: &str) -> Result<()> {
        let price = match self.market.latest_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "price fetch failed");
                return self.reply(chat_id, &format::price_unavailable(symbol)).await;
            }
        };

        let position = self.positions.add_position(chat_id, symbol, price).await?;
        tracing::info!(chat_id, symbol, price, id = %position.id, "position recorded");

        let mut text = format::recorded(symbol, price);
        if !self.registry.is_running(chat_id).await {
            text.push('\n');
            text.push_str(format::MONITOR_HINT);
        }
        self.reply(chat_id, &text).await
    }

    async fn invest(
        &self,
        chat_id: i64,
        mut context: Context,
        request: &InvestmentRequest,
    ) -> Result<()> {
        self.reply(
            chat_id,
            &format::received(request, self.advisor.pick_count()),
        )
        .await?;

        match self.advisor.advise(request, &mut context).await {
            Ok(advice) => {
                tracing::info!(
                    chat_id,
                    picks = advice.picks.len(),
                    top = ?advice.top,
                    model = ?context.model(),
                    "advice ready"
                );
                self.reply(chat_id, &advice.render()).await
            }
            Err(e) => {
                tracing::error!(chat_id, error = %e, "recommendation failed");
                self.reply(chat_id, RECOMMENDATION_FAILED).await
            }
        }
    }

    /// Handle one update; failures are logged and reported to the chat
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        if message.from.as_ref().is_some_and(|u| u.is_bot) {
            return;
        }
        let Some(text) = message.text else {
            return;
        };

        let chat_id = message.chat.id;
        let mut context = Context::new().with_chat_id(chat_id);
        if let Some(user) = &message.from {
            let name = user.username.as_deref().unwrap_or(&user.first_name);
            context = context.with_user_name(name);
        }
        if let Err(e) = self.dispatch(chat_id, context, &text).await {
            tracing::error!(chat_id, error = %e, "message handling failed");
            if let Err(e) = self.reply(chat_id, format::INTERNAL_ERROR).await {
                tracing::warn!(chat_id, error = %e, "error reply failed");
            }
        }
    }

    /// Long-poll `client` until Ctrl-C, then stop the monitor tasks
    pub async fn run(self: Arc<Self>, client: &TelegramClient, long_poll: Duration) -> Result<()> {
        let mut offset: Option<i64> = None;
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!("polling for updates");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                result = client.get_updates(offset, long_poll) => match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            let bot = Arc::clone(&self);
                            tokio::spawn(async move { bot.handle_update(update).await });
                        }
                    }
                    Err(e) => {
                        let delay = match &e {
                            BotError::RateLimitExceeded {
                                retry_after: Some(delay),
                                ..
                            } => *delay,
                            _ => POLL_ERROR_BACKOFF,
                        };
                        tracing::warn!(error = %e, ?delay, "getUpdates failed");
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        self.registry.shutdown().await;
        Ok(())
    }
}
