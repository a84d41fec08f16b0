//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Page fetching (`Fetcher`, `HttpFetcher`)
//! - Content segmentation (`Segmenter`)
//! - Keyword relevance gating (`RelevanceFilter`)
//! - Event classification (`EventClassifier`, `GeminiBackend`)
//! - Source discovery (`SourceDiscovery`)
//! - Web and news search (`SearchProvider`, `YouComSearch`)

mod classifier;
mod discovery;
mod fetcher;
mod generative;
mod relevance;
mod search;
mod segmenter;

pub use classifier::{
    ClassifyOutcome, ClassifyRequest, EventClassifier, EventDraft, GenerativeOutcome, IngestPath,
    SkipReason,
};
pub use discovery::SourceDiscovery;
pub use fetcher::{Fetcher, HttpFetcher};
pub use generative::{GeminiBackend, Generation, GenerationParams, GenerativeBackend};
pub use relevance::{RelevanceFilter, Verdict};
pub use search::{HitKind, SearchHit, SearchProvider, YouComSearch};
pub use segmenter::{FALLBACK_HEADING, LEADING_HEADING, Segmenter};
