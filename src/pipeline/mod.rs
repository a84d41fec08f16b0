//! Pipeline entry points for crawler operations.
//!
//! - `run_discovery`: Derive sources from competitor homepages
//! - `run_crawl`: Crawl documentation sources into events
//! - `run_search_crawl`: Turn search hits into events
//! - `list_sources`, `list_recent_events`, `competitor_registry`, `crawl_status`: read-only views

pub mod crawl;
pub mod diff;
pub mod load;
pub mod map;
pub mod search;
pub mod validate;

pub use crawl::{CrawlBudget, CrawlContext, CrawlControl, Stage, plan_sources, run_crawl};
pub use diff::{ChangeDetector, ChangedChunk, Detection, detect_changes};
pub use load::{CrawlStatus, competitor_registry, crawl_status, list_recent_events, list_sources};
pub use map::run_discovery;
pub use search::{dedup_key, run_search_crawl};
pub use validate::run_validate;
