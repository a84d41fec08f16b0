//! Run statistics.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters describing one crawl run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub events_created: usize,
    pub sources_crawled: usize,
    pub sources_failed: usize,
    /// New or changed chunks (docs path) or unseen hits (search path)
    pub chunks_changed: usize,
    /// Chunks judged irrelevant or off-topic
    pub chunks_rejected: usize,
    pub persistence_failures: usize,
    pub competitors: BTreeSet<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    /// Set when the run stopped early on request
    pub cancelled: bool,
}

impl CrawlStats {
    pub fn start() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Stamp the end time and compute the duration.
    pub fn finish(&mut self) {
        let finished = Utc::now();
        if let Some(started) = self.started_at {
            self.duration_seconds = (finished - started).num_milliseconds() as f64 / 1000.0;
        }
        self.finished_at = Some(finished);
    }

    pub fn log_summary(&self, label: &str) {
        log::info!(
            "{} finished in {:.1}s: {} events, {} sources crawled, {} failed, {} changed, {} rejected, {} persistence failures{}",
            label,
            self.duration_seconds,
            self.events_created,
            self.sources_crawled,
            self.sources_failed,
            self.chunks_changed,
            self.chunks_rejected,
            self.persistence_failures,
            if self.cancelled { " (cancelled)" } else { "" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_sets_duration() {
        let mut stats = CrawlStats::start();
        stats.finish();
        assert!(stats.finished_at.is_some());
        assert!(stats.duration_seconds >= 0.0);
    }
}
