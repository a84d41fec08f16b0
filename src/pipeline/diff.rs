//! Change detection against the checkpoint.
//!
//! Compares the chunks of a freshly crawled page with the hashes stored for
//! that URL and reports which chunks are new or changed. The detector never
//! writes anything: it returns the would-be state and the caller decides what
//! to commit.

use std::collections::HashMap;

use crate::models::{Chunk, UrlState};

/// A chunk that is new or whose content hash differs from the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedChunk {
    pub chunk: Chunk,
    pub key: String,
    pub hash: String,
    /// Stored hash, `None` when the key was never seen
    pub previous_hash: Option<String>,
}

/// Result of comparing one page against its stored state.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub changed: Vec<ChangedChunk>,
    pub unchanged: usize,
    /// Stored state with every current chunk applied
    pub updated: UrlState,
}

impl Detection {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.changed.len()
    }
}

/// Detector for new and changed chunks.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    max_key_chars: usize,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self { max_key_chars: 120 }
    }
}

impl ChangeDetector {
    pub fn new(max_key_chars: usize) -> Self {
        Self { max_key_chars }
    }

    /// Compare `chunks` of one page with its stored state.
    ///
    /// Keys stored for the URL but absent from this crawl are kept as they
    /// are. A heading repeated on the same page gets a ` #n` suffix from its
    /// second occurrence on.
    pub fn detect(&self, chunks: Vec<Chunk>, previous: Option<&UrlState>) -> Detection {
        let mut detection = Detection {
            updated: previous.cloned().unwrap_or_default(),
            ..Detection::default()
        };
        let mut occurrences: HashMap<String, usize> = HashMap::new();

        for chunk in chunks {
            let base_key = chunk.key(self.max_key_chars);
            let count = occurrences.entry(base_key.clone()).or_insert(0);
            *count += 1;
            let key = if *count > 1 {
                format!("{} #{}", base_key, count)
            } else {
                base_key
            };

            let hash = chunk.hash();
            let previous_hash = previous.and_then(|state| state.get(&key)).cloned();

            if previous_hash.as_deref() == Some(hash.as_str()) {
                detection.unchanged += 1;
            } else {
                detection.updated.insert(key.clone(), hash.clone());
                detection.changed.push(ChangedChunk {
                    chunk,
                    key,
                    hash,
                    previous_hash,
                });
            }
        }

        detection
    }
}

/// Calculate changes using the default key length.
pub fn detect_changes(chunks: Vec<Chunk>, previous: Option<&UrlState>) -> Detection {
    ChangeDetector::default().detect(chunks, previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(heading: &str, body: &str) -> Chunk {
        Chunk::new(heading, body)
    }

    fn state(chunks: &[Chunk]) -> UrlState {
        detect_changes(chunks.to_vec(), None).updated
    }

    #[test]
    fn test_no_changes() {
        let chunks = vec![chunk("A", "one"), chunk("B", "two")];
        let stored = state(&chunks);

        let detection = detect_changes(chunks, Some(&stored));
        assert!(!detection.has_changes());
        assert_eq!(detection.unchanged, 2);
        assert_eq!(detection.updated, stored);
    }

    #[test]
    fn test_empty_to_full() {
        let detection = detect_changes(vec![chunk("A", "one"), chunk("B", "two")], None);
        assert_eq!(detection.change_count(), 2);
        assert!(detection.changed.iter().all(|c| c.previous_hash.is_none()));
    }

    #[test]
    fn test_updates() {
        let stored = state(&[chunk("A", "one"), chunk("B", "two")]);
        let detection = detect_changes(vec![chunk("A", "one"), chunk("B", "changed")], Some(&stored));

        assert_eq!(detection.change_count(), 1);
        assert_eq!(detection.changed[0].key, "B");
        assert_eq!(detection.changed[0].previous_hash, stored.get("B").cloned());
        assert_eq!(detection.updated["B"], chunk("B", "changed").hash());
    }

    #[test]
    fn test_missing_keys_are_kept() {
        let stored = state(&[chunk("A", "one"), chunk("Gone", "old")]);
        let detection = detect_changes(vec![chunk("A", "one")], Some(&stored));

        assert!(!detection.has_changes());
        assert!(detection.updated.contains_key("Gone"));
    }

    #[test]
    fn test_repeated_headings_are_distinguished() {
        let chunks = vec![chunk("Bug fixes", "first"), chunk("Bug fixes", "second")];
        let first = detect_changes(chunks.clone(), None);
        assert_eq!(first.change_count(), 2);
        assert!(first.updated.contains_key("Bug fixes"));
        assert!(first.updated.contains_key("Bug fixes #2"));

        let second = detect_changes(chunks, Some(&first.updated));
        assert!(!second.has_changes());
    }

    #[test]
    fn test_long_headings_truncated_to_key() {
        let heading = "h".repeat(300);
        let detection = ChangeDetector::new(120).detect(vec![chunk(&heading, "x")], None);
        assert_eq!(detection.changed[0].key.chars().count(), 120);
    }
}
