// src/pipeline/load.rs

//! Read-only views over the registry and stored state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{CHECKPOINT_KEY, Checkpoint, CompetitorEntry, Event, Registry, Source};
use crate::storage::{CheckpointStore, EventStore};

/// Every source of the active competitors, in registry order.
pub fn list_sources(registry: &Registry, max_priority: u8) -> Vec<Source> {
    registry.sources(max_priority)
}

/// The most recent events, newest first.
pub async fn list_recent_events<S>(store: &S, limit: usize) -> Result<Vec<Event>>
where
    S: EventStore + ?Sized,
{
    store.recent_events(limit).await
}

/// Active competitors with their sources grouped under them.
pub fn competitor_registry(registry: &Registry, max_priority: u8) -> Vec<CompetitorEntry> {
    let sources = registry.sources(max_priority);
    registry
        .active_competitors(max_priority)
        .into_iter()
        .map(|c| CompetitorEntry {
            name: c.name.clone(),
            category: c.category.clone(),
            description: c.description.clone(),
            priority: c.priority,
            search_terms: c.search_terms.clone(),
            sources: sources
                .iter()
                .filter(|s| s.competitor == c.name)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Summary of what the crawler has stored so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlStatus {
    pub urls_tracked: usize,
    pub chunks_tracked: usize,
    pub updated_at: Option<DateTime<Utc>>,
    pub event_count: usize,
}

pub async fn crawl_status<S>(store: &S) -> Result<CrawlStatus>
where
    S: CheckpointStore + EventStore + ?Sized,
{
    let checkpoint = Checkpoint::from_value(store.get(CHECKPOINT_KEY).await?);
    Ok(CrawlStatus {
        urls_tracked: checkpoint.url_count(),
        chunks_tracked: checkpoint.chunk_count(),
        updated_at: checkpoint.updated_at,
        event_count: store.event_count().await?,
    })
}
