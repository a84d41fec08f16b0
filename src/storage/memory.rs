//! In-memory storage for tests and throwaway runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::Event;
use crate::storage::{CheckpointStore, EventStore, MarkerStore, newest_first};

#[derive(Default)]
pub struct MemoryStorage {
    cells: Mutex<HashMap<String, Value>>,
    events: Mutex<Vec<Event>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event, in insertion order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::persistence("memory storage lock poisoned")
}

#[async_trait]
impl CheckpointStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let cells = self.cells.lock().map_err(poisoned)?;
        Ok(cells.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let mut cells = self.cells.lock().map_err(poisoned)?;
        cells.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[async_trait]
impl MarkerStore for MemoryStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        let cells = self.cells.lock().map_err(poisoned)?;
        Ok(cells.contains_key(key))
    }

    async fn mark(&self, key: &str, value: &Value) -> Result<()> {
        self.put(key, value).await
    }
}

#[async_trait]
impl EventStore for MemoryStorage {
    async fn insert_event(&self, event: &Event) -> Result<bool> {
        let mut events = self.events.lock().map_err(poisoned)?;
        if events.iter().any(|e| e.id == event.id) {
            return Ok(false);
        }
        events.push(event.clone());
        Ok(true)
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        let events = self.events.lock().map_err(poisoned)?.clone();
        Ok(newest_first(events, limit))
    }

    async fn event_count(&self) -> Result<usize> {
        Ok(self.events.lock().map_err(poisoned)?.len())
    }
}
