//! Storage abstractions for checkpoints, markers and events.
//!
//! Three narrow capabilities back a crawl run:
//! - [`CheckpointStore`]: one JSON value per key (the change-detection checkpoint)
//! - [`MarkerStore`]: processed-item markers for the search path
//! - [`EventStore`]: append-only capability events
//!
//! ## Directory Structure (LocalStorage)
//!
//! ```text
//! storage/
//! ├── config.toml           # Optional configuration
//! ├── seed.toml             # Optional competitor list
//! ├── sources.json          # Discovered sources
//! ├── events.jsonl          # Append-only event log, one event per line
//! └── state/                # One file per checkpoint/marker key
//!     ├── competitor_source_state.json
//!     └── intel%3A<hash>.json
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::Event;

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Key-value cell store holding the change-detection checkpoint.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read a value; `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    async fn put(&self, key: &str, value: &Value) -> Result<()>;
}

/// Processed-item markers used for search-path deduplication.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    async fn mark(&self, key: &str, value: &Value) -> Result<()>;
}

/// Append-only event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert an event. Returns `false` when an event with the same id
    /// already exists; the store is left unchanged in that case.
    async fn insert_event(&self, event: &Event) -> Result<bool>;

    /// Most recent events, newest first.
    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>>;

    async fn event_count(&self) -> Result<usize>;
}

/// Every capability a crawl run needs, behind one trait object.
pub trait Storage: CheckpointStore + MarkerStore + EventStore {}

impl<T: CheckpointStore + MarkerStore + EventStore> Storage for T {}

/// Order events newest first and keep at most `limit`.
pub(crate) fn newest_first(mut events: Vec<Event>, limit: usize) -> Vec<Event> {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    events.truncate(limit);
    events
}
