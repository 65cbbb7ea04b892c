//! JSON-file persistence for positions and monitored chats
//!
//! Each store keeps its state in memory behind a `tokio::sync::Mutex` and
//! writes the whole file on every change (temp file + rename).

use crate::error::{BotError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A recorded buy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub chat_id: i64,
    pub symbol: String,
    pub entry_price: f64,
    /// When the buy was recorded (RFC 3339, UTC)
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(chat_id: i64, symbol: impl Into<String>, entry_price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            symbol: symbol.into(),
            entry_price,
            timestamp: Utc::now(),
        }
    }
}

async fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(BotError::StorageError(format!("{}: {e}", path.display())));
        }
    };

    if raw.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&raw)
        .map_err(|e| BotError::StorageError(format!("{} is corrupt: {e}", path.display())))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let storage_err = |e: std::io::Error| BotError::StorageError(format!("{}: {e}", path.display()));

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(storage_err)?;
    }

    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(storage_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(storage_err)?;
    Ok(())
}

/// Positions for every chat, persisted to `positions.json`
pub struct PositionStore {
    path: PathBuf,
    positions: Mutex<Vec<Position>>,
}

impl PositionStore {
    /// Open the store; a missing file is an empty store
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let positions: Vec<Position> = read_json(&path).await?;
        tracing::info!(path = %path.display(), count = positions.len(), "positions loaded");
        Ok(Self {
            path,
            positions: Mutex::new(positions),
        })
    }

    pub async fn add_position(
        &self,
        chat_id: i64,
        symbol: &str,
        entry_price: f64,
    ) -> Result<Position> {
        let position = Position::new(chat_id, symbol, entry_price);
        let mut guard = self.positions.lock().await;

        let mut next = guard.clone();
        next.push(position.clone());
        write_json(&self.path, &next).await?;
        *guard = next;

        Ok(position)
    }

    pub async fn positions_for(&self, chat_id: i64) -> Vec<Position> {
        self.positions
            .lock()
            .await
            .iter()
            .filter(|p| p.chat_id == chat_id)
            .cloned()
            .collect()
    }

    /// Remove every position in `symbol` for the chat, returning how many went
    pub async fn remove_symbol(&self, chat_id: i64, symbol: &str) -> Result<usize> {
        self.remove_where(|p| p.chat_id == chat_id && p.symbol.eq_ignore_ascii_case(symbol))
            .await
    }

    /// Remove all positions for the chat
    pub async fn clear(&self, chat_id: i64) -> Result<usize> {
        self.remove_where(|p| p.chat_id == chat_id).await
    }

    pub async fn all(&self) -> Vec<Position> {
        self.positions.lock().await.clone()
    }

    async fn remove_where<F>(&self, matches: F) -> Result<usize>
    where
        F: Fn(&Position) -> bool,
    {
        let mut guard = self.positions.lock().await;
        let next: Vec<Position> = guard.iter().filter(|p| !matches(p)).cloned().collect();
        let removed = guard.len() - next.len();
        if removed > 0 {
            write_json(&self.path, &next).await?;
            *guard = next;
        }
        Ok(removed)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MonitorFile {
    chats: BTreeSet<i64>,
}

/// Chats with monitoring switched on, persisted to `monitor.json`
pub struct MonitorStore {
    path: PathBuf,
    state: Mutex<MonitorFile>,
}

impl MonitorStore {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state: MonitorFile = read_json(&path).await?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Returns false if the chat was already enabled
    pub async fn enable(&self, chat_id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.chats.contains(&chat_id) {
            return Ok(false);
        }
        let mut next = MonitorFile {
            chats: state.chats.clone(),
        };
        next.chats.insert(chat_id);
        write_json(&self.path, &next).await?;
        *state = next;
        Ok(true)
    }

    /// Returns false if the chat was not enabled
    pub async fn disable(&self, chat_id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.chats.contains(&chat_id) {
            return Ok(false);
        }
        let mut next = MonitorFile {
            chats: state.chats.clone(),
        };
        next.chats.remove(&chat_id);
        write_json(&self.path, &next).await?;
        *state = next;
        Ok(true)
    }

    pub async fn chats(&self) -> Vec<i64> {
        self.state.lock().await.chats.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = PositionStore::load(dir.path().join("positions.json"))
            .await
            .unwrap();
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("positions.json");

        let store = PositionStore::load(&path).await.unwrap();
        let p = store.add_position(42, "TCS", 3890.5).await.unwrap();
        store.add_position(42, "INFY", 1500.0).await.unwrap();
        store.add_position(7, "TCS", 3900.0).await.unwrap();

        let reopened = PositionStore::load(&path).await.unwrap();
        let mine = reopened.positions_for(42).await;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0], p);
        assert_eq!(reopened.all().await.len(), 3);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        let store = PositionStore::load(&path).await.unwrap();
        store.add_position(1, "SBIN", 812.25).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &raw[0];
        assert_eq!(entry["symbol"], "SBIN");
        assert_eq!(entry["chat_id"], 1);
        assert_eq!(entry["entry_price"], 812.25);
        let ts = entry["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn test_remove_symbol_and_clear_are_per_chat() {
        let dir = TempDir::new().unwrap();
        let store = PositionStore::load(dir.path().join("p.json")).await.unwrap();
        store.add_position(1, "TCS", 10.0).await.unwrap();
        store.add_position(1, "TCS", 11.0).await.unwrap();
        store.add_position(1, "INFY", 12.0).await.unwrap();
        store.add_position(2, "TCS", 13.0).await.unwrap();

        assert_eq!(store.remove_symbol(1, "tcs").await.unwrap(), 2);
        assert_eq!(store.remove_symbol(1, "WIPRO").await.unwrap(), 0);
        assert_eq!(store.positions_for(2).await.len(), 1);

        assert_eq!(store.clear(1).await.unwrap(), 1);
        assert!(store.positions_for(1).await.is_empty());
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = PositionStore::load(&path).await.err().unwrap();
        assert!(matches!(err, BotError::StorageError(ref m) if m.contains("corrupt")));
    }

    #[tokio::test]
    async fn test_monitor_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("monitor.json");

        let store = MonitorStore::load(&path).await.unwrap();
        assert!(store.enable(5).await.unwrap());
        assert!(!store.enable(5).await.unwrap());
        assert!(store.enable(3).await.unwrap());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"chats\""));

        let reopened = MonitorStore::load(&path).await.unwrap();
        assert_eq!(reopened.chats().await, vec![3, 5]);
        assert!(reopened.disable(3).await.unwrap());
        assert!(!reopened.disable(3).await.unwrap());
        assert_eq!(reopened.chats().await, vec![5]);
    }
}
