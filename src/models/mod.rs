// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod checkpoint;
mod chunk;
mod competitor;
mod config;
mod event;
mod seed;
mod stats;

// Re-export all public types
pub use checkpoint::{CHECKPOINT_KEY, Checkpoint, UrlState};
pub use chunk::{Chunk, chunk_hash, chunk_key};
pub use competitor::{Competitor, Freshness, Registry, Source, SourceKind, SourceSpec};
pub use config::{
    ClassifierConfig, Config, CrawlerConfig, DiscoveryConfig, RelevanceConfig, SearchConfig,
    SegmenterConfig,
};
pub use event::{ChangeType, Event, Theme, event_id};
pub use seed::Seed;
pub use stats::CrawlStats;

/// Sources of one competitor, grouped for display.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompetitorEntry {
    pub name: String,
    pub category: String,
    pub description: String,
    pub priority: u8,
    pub search_terms: Vec<String>,
    pub sources: Vec<Source>,
}
