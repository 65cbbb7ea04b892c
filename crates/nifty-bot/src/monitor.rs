//! Position monitoring
//!
//! Every monitored chat gets its own tokio task that wakes once per poll
//! interval, prices the chat's positions and sends one batched alert message
//! for those that moved past the thresholds.

use crate::api::Messenger;
use crate::config::AlertThresholds;
use crate::error::Result;
use crate::market::MarketData;
use crate::storage::{MonitorStore, Position, PositionStore};
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const IST: FixedOffset = match FixedOffset::east_opt(5 * 3600 + 30 * 60) {
    Some(offset) => offset,
    None => panic!("IST offset out of range"),
};

/// India Standard Time, UTC+05:30
pub fn ist() -> FixedOffset {
    IST
}

/// NSE cash session, Mon-Fri 09:15-15:30 IST. Exchange holidays are not known.
pub fn is_market_open(at: DateTime<Utc>) -> bool {
    let local = at.with_timezone(&ist());
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minutes = local.hour() * 60 + local.minute();
    (9 * 60 + 15..=15 * 60 + 30).contains(&minutes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// A position that moved past a threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub symbol: String,
    pub direction: Direction,
    pub change_percent: f64,
    pub current: f64,
    pub entry: f64,
}

impl Alert {
    pub fn line(&self) -> String {
        let (icon, word) = match self.direction {
            Direction::Up => ("📈", "up"),
            Direction::Down => ("📉", "down"),
        };
        format!(
            "{icon} {} {word} {:.2}% (₹{:.2}) since entry ₹{:.2}",
            self.symbol, self.change_percent, self.current, self.entry
        )
    }
}

/// Compare the current price with the entry
pub fn evaluate(position: &Position, current: f64, thresholds: &AlertThresholds) -> Option<Alert> {
    let entry = position.entry_price;
    if !(entry > 0.0) || !current.is_finite() {
        return None;
    }

    let change_percent = (current - entry) / entry * 100.0;
    let direction = if change_percent >= thresholds.up {
        Direction::Up
    } else if change_percent <= thresholds.down {
        Direction::Down
    } else {
        return None;
    };

    Some(Alert {
        symbol: position.symbol.clone(),
        direction,
        change_percent,
        current,
        entry,
    })
}

/// Batched alert text
pub fn alert_message(alerts: &[Alert], at: DateTime<Utc>) -> String {
    let stamp = at.with_timezone(&ist()).format("%H:%M");
    let lines: Vec<String> = alerts.iter().map(Alert::line).collect();
    format!("🚨 Position Alerts ({stamp} IST):\n\n{}", lines.join("\n"))
}

/// Prices positions and notifies chats
pub struct Monitor {
    positions: Arc<PositionStore>,
    market: Arc<dyn MarketData>,
    messenger: Arc<dyn Messenger>,
    thresholds: AlertThresholds,
}

impl Monitor {
    pub fn new(
        positions: Arc<PositionStore>,
        market: Arc<dyn MarketData>,
        messenger: Arc<dyn Messenger>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            positions,
            market,
            messenger,
            thresholds,
        }
    }

    /// Alerts for one chat; positions whose price cannot be fetched are skipped
    pub async fn sweep(&self, chat_id: i64) -> Vec<Alert> {
        let positions = self.positions.positions_for(chat_id).await;
        let mut alerts = Vec::new();

        for position in &positions {
            let current = match self.market.latest_price(&position.symbol).await {
                Ok(price) => price,
                Err(e) => {
                    tracing::warn!(
                        chat_id,
                        symbol = %position.symbol,
                        error = %e,
                        "price fetch failed"
                    );
                    continue;
                }
            };

            tracing::debug!(
                chat_id,
                symbol = %position.symbol,
                entry = position.entry_price,
                current,
                "position priced"
            );

            if let Some(alert) = evaluate(position, current, &self.thresholds) {
                alerts.push(alert);
            }
        }

        alerts
    }

    /// Sweep and send the batch if anything moved. Returns the alert count.
    pub async fn sweep_and_notify(&self, chat_id: i64) -> Result<usize> {
        let alerts = self.sweep(chat_id).await;
        if alerts.is_empty() {
            tracing::info!(chat_id, "no significant movements");
            return Ok(0);
        }

        self.messenger
            .send_text(chat_id, &alert_message(&alerts, Utc::now()))
            .await?;
        tracing::info!(chat_id, count = alerts.len(), "alerts sent");
        Ok(alerts.len())
    }
}

struct Running {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// One monitoring task per chat
pub struct MonitorRegistry {
    monitor: Arc<Monitor>,
    store: Arc<MonitorStore>,
    poll_interval: Duration,
    market_hours_only: bool,
    running: Mutex<HashMap<i64, Running>>,
}

impl MonitorRegistry {
    pub fn new(
        monitor: Arc<Monitor>,
        store: Arc<MonitorStore>,
        poll_interval: Duration,
        market_hours_only: bool,
    ) -> Self {
        Self {
            monitor,
            store,
            poll_interval,
            market_hours_only,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Start monitoring a chat. Returns false if it was already running.
    pub async fn start(&self, chat_id: i64) -> Result<bool> {
        let mut running = self.running.lock().await;
        if running.contains_key(&chat_id) {
            return Ok(false);
        }

        self.store.enable(chat_id).await?;
        running.insert(chat_id, self.spawn(chat_id));
        tracing::info!(chat_id, "monitoring started");
        Ok(true)
    }

    /// Stop monitoring a chat. Returns false if it was not running.
    pub async fn stop(&self, chat_id: i64) -> Result<bool> {
        let mut running = self.running.lock().await;
        self.store.disable(chat_id).await?;

        match running.remove(&chat_id) {
            Some(task) => {
                let _ = task.stop.send(true);
                tracing::info!(chat_id, "monitoring stopped");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Restart tasks for chats persisted as monitored
    pub async fn resume(&self) -> Result<usize> {
        let chats = self.store.chats().await;
        let mut running = self.running.lock().await;
        let mut resumed = 0;
        for chat_id in chats {
            if !running.contains_key(&chat_id) {
                running.insert(chat_id, self.spawn(chat_id));
                resumed += 1;
            }
        }
        if resumed > 0 {
            tracing::info!(count = resumed, "monitoring resumed");
        }
        Ok(resumed)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn is_running(&self, chat_id: i64) -> bool {
        self.running.lock().await.contains_key(&chat_id)
    }

    /// Stop every task without forgetting which chats are monitored
    pub async fn shutdown(&self) {
        let tasks: Vec<Running> = self.running.lock().await.drain().map(|(_, t)| t).collect();
        for task in &tasks {
            let _ = task.stop.send(true);
        }
        for task in tasks {
            let _ = task.handle.await;
        }
    }

    fn spawn(&self, chat_id: i64) -> Running {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.monitor),
            chat_id,
            self.poll_interval,
            self.market_hours_only,
            stop_rx,
        ));
        Running { stop, handle }
    }
}

async fn run_loop(
    monitor: Arc<Monitor>,
    chat_id: i64,
    poll_interval: Duration,
    market_hours_only: bool,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
        }

        if market_hours_only && !is_market_open(Utc::now()) {
            tracing::debug!(chat_id, "market closed, sweep skipped");
            continue;
        }

        if let Err(e) = monitor.sweep_and_notify(chat_id).await {
            tracing::error!(chat_id, error = %e, "monitoring sweep failed");
        }
    }

    tracing::debug!(chat_id, "monitor task finished");
}
