//! Persisted per-URL chunk hashes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Key of the single checkpoint row.
pub const CHECKPOINT_KEY: &str = "competitor_source_state";

/// Chunk key to content hash, for one URL.
pub type UrlState = BTreeMap<String, String>;

/// Last-seen content hash for every chunk of every crawled URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub urls: BTreeMap<String, UrlState>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Build a checkpoint from a stored value.
    ///
    /// Entries of the wrong shape are dropped, so a damaged row degrades to
    /// re-processing instead of failing the run.
    pub fn from_value(value: Option<Value>) -> Self {
        let Some(Value::Object(root)) = value else {
            return Self::default();
        };

        let updated_at = root
            .get("updated_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let mut urls = BTreeMap::new();
        if let Some(Value::Object(entries)) = root.get("urls") {
            for (url, chunks) in entries {
                let Value::Object(chunks) = chunks else {
                    log::warn!("Dropping malformed checkpoint entry for {}", url);
                    continue;
                };
                let state: UrlState = chunks
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|h| (k.clone(), h.to_string())))
                    .collect();
                urls.insert(url.clone(), state);
            }
        }

        Self { urls, updated_at }
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn url_state(&self, url: &str) -> Option<&UrlState> {
        self.urls.get(url)
    }

    /// Replace the stored state of one URL and bump the timestamp.
    pub fn replace_url(&mut self, url: &str, state: UrlState) {
        self.urls.insert(url.to_string(), state);
        self.updated_at = Some(Utc::now());
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.urls.values().map(BTreeMap::len).sum()
    }
}
