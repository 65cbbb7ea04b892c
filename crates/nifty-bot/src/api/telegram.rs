//! Minimal Telegram Bot API client
//!
//! Long polling only: `getUpdates`, `sendMessage` and `getMe`.

use crate::error::{BotError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects texts longer than this many UTF-16 units
pub const MAX_MESSAGE_LEN: usize = 4096;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Something that can deliver text to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send text that Telegram renders with `mode`
    async fn send_formatted(&self, chat_id: i64, text: &str, mode: ParseMode) -> Result<()>;
}

/// Formatting applied by Telegram to outgoing text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    #[serde(rename = "HTML")]
    Html,
}

/// Response envelope shared by every Bot API method
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    #[serde(default)]
    pub date: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    send_limiter: SharedRateLimiter,
    retry: RetryPolicy,
}

impl TelegramClient {
    /// `rate_limit` is outgoing messages per second, `long_poll` the
    /// `getUpdates` timeout
    pub fn new(token: &str, rate_limit: u32, long_poll: Duration) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(BotError::ConfigError("Telegram token is empty".to_string()));
        }

        // The HTTP timeout has to outlive the server-side long poll
        let client = Client::builder()
            .timeout(long_poll + Duration::from_secs(15))
            .build()?;

        let quota = Quota::per_second(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: format!("{API_BASE}/bot{token}"),
            send_limiter: Arc::new(RateLimiter::direct(quota)),
            retry: RetryPolicy::default(),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            BotError::Telegram(format!("{method}: unreadable response (HTTP {status}): {e}"))
        })?;
        into_result(method, envelope)
    }

    /// Long-poll for new updates after `offset`
    #[tracing::instrument(skip(self))]
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &body).await
    }

    /// Send one message; `text` must already fit in a single Telegram message
    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode,
            disable_web_page_preview: true,
        };

        self.retry
            .execute("sendMessage", || async {
                self.send_limiter.until_ready().await;
                self.call::<_, serde_json::Value>("sendMessage", &body).await
            })
            .await?;
        Ok(())
    }

    /// Identity of the bot behind the token
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.send_message(chat_id, &chunk, None).await?;
        }
        Ok(())
    }

    async fn send_formatted(&self, chat_id: i64, text: &str, mode: ParseMode) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.send_message(chat_id, &chunk, Some(mode)).await?;
        }
        Ok(())
    }
}

fn into_result<T>(method: &str, envelope: ApiResponse<T>) -> Result<T> {
    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| BotError::Telegram(format!("{method}: ok without result")));
    }

    let description = envelope
        .description
        .unwrap_or_else(|| "no description".to_string());

    if envelope.error_code == Some(429) {
        let retry_after = envelope
            .parameters
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs);
        return Err(BotError::RateLimitExceeded {
            provider: "Telegram".to_string(),
            retry_after,
        });
    }

    Err(BotError::Telegram(format!(
        "{method} failed ({}): {description}",
        envelope.error_code.unwrap_or_default()
    )))
}

/// Telegram measures message length in UTF-16 code units
fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split `text` into chunks of at most `limit` UTF-16 units, preferring line breaks
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if utf16_len(text) <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = utf16_len(line);

        if current_len > 0 && current_len + 1 + line_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            // Hard-wrap a single oversized line
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            for c in line.chars() {
                if current_len + c.len_utf16() > limit {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(c);
                current_len += c.len_utf16();
            }
            continue;
        }

        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
