//! Local filesystem storage implementation.
//!
//! State rows are written to a temporary file first and renamed into place.
//! Events are appended one JSON object per line; a torn last line left by a
//! crash is skipped on read.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── events.jsonl          # Append-only event log
//! └── state/
//!     └── <key>.json        # {"key", "value", "updated_at"}, key form-urlencoded
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::Event;
use crate::storage::{CheckpointStore, EventStore, MarkerStore, newest_first};

const EVENTS_FILE: &str = "events.jsonl";
const STATE_DIR: &str = "state";

/// One stored key-value row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateRow {
    key: String,
    value: Value,
    updated_at: DateTime<Utc>,
}

/// What the event log already holds, loaded on first insert.
#[derive(Debug, Default)]
struct EventLog {
    ids: HashSet<String>,
    /// The file ends in a torn line that the next append must terminate
    needs_newline: bool,
}

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    event_log: Arc<Mutex<Option<EventLog>>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            event_log: Arc::new(Mutex::new(None)),
        }
    }

    /// Create the storage and make sure its directories are writable.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage = Self::new(root_dir);
        tokio::fs::create_dir_all(storage.root_dir.join(STATE_DIR))
            .await
            .map_err(|e| {
                AppError::persistence(format!(
                    "cannot create storage at {}: {}",
                    storage.root_dir.display(),
                    e
                ))
            })?;
        Ok(storage)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Relative file path of a state key.
    ///
    /// The key is form-urlencoded, so distinct keys never share a file.
    fn state_key(key: &str) -> String {
        let file: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        format!("{}/{}.json", STATE_DIR, file)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Append bytes to a file, creating it if needed.
    async fn append_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn read_row(&self, key: &str) -> Result<Option<StateRow>> {
        self.read_json(&Self::state_key(key)).await
    }

    async fn write_row(&self, key: &str, value: &Value) -> Result<()> {
        let row = StateRow {
            key: key.to_string(),
            value: value.clone(),
            updated_at: Utc::now(),
        };
        self.write_json(&Self::state_key(key), &row).await
    }

    async fn load_events(&self) -> Result<Vec<Event>> {
        let bytes = self.read_bytes(EVENTS_FILE).await?.unwrap_or_default();
        Ok(parse_events(&bytes))
    }

    async fn load_event_log(&self) -> Result<EventLog> {
        let bytes = self.read_bytes(EVENTS_FILE).await?.unwrap_or_default();
        Ok(EventLog {
            ids: parse_events(&bytes).into_iter().map(|e| e.id).collect(),
            needs_newline: bytes.last().is_some_and(|b| *b != b'\n'),
        })
    }
}

/// Parse a JSON Lines event log, skipping lines that do not decode.
fn parse_events(bytes: &[u8]) -> Vec<Event> {
    String::from_utf8_lossy(bytes)
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                log::warn!("Skipping unreadable event on line {}: {}", idx + 1, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl CheckpointStore for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_row(key).await?.map(|row| row.value))
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        self.write_row(key, value)
            .await
            .map_err(|e| AppError::persistence(format!("checkpoint '{}': {}", key, e)))
    }
}

#[async_trait]
impl MarkerStore for LocalStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(&Self::state_key(key))).await?)
    }

    async fn mark(&self, key: &str, value: &Value) -> Result<()> {
        self.write_row(key, value)
            .await
            .map_err(|e| AppError::persistence(format!("marker '{}': {}", key, e)))
    }
}

#[async_trait]
impl EventStore for LocalStorage {
    async fn insert_event(&self, event: &Event) -> Result<bool> {
        let mut guard = self.event_log.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_event_log().await?);
        }
        let state = guard.get_or_insert_with(EventLog::default);
        if state.ids.contains(&event.id) {
            return Ok(false);
        }

        let mut line = Vec::new();
        if state.needs_newline {
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, event)?;
        line.push(b'\n');

        self.append_bytes(EVENTS_FILE, &line)
            .await
            .map_err(|e| AppError::persistence(format!("event '{}': {}", event.id, e)))?;
        state.needs_newline = false;
        state.ids.insert(event.id.clone());
        Ok(true)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        Ok(newest_first(self.load_events().await?, limit))
    }

    async fn event_count(&self) -> Result<usize> {
        Ok(self.load_events().await?.len())
    }
}
