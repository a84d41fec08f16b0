//! Content chunk and its identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A heading-delimited section of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub heading: String,
    pub body: String,
}

impl Chunk {
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }

    /// Identity of this chunk within its page.
    pub fn key(&self, max_chars: usize) -> String {
        chunk_key(&self.heading, max_chars)
    }

    /// Content hash over heading and body.
    pub fn hash(&self) -> String {
        chunk_hash(&self.heading, &self.body)
    }
}

/// Truncate a heading to at most `max_chars` characters.
pub fn chunk_key(heading: &str, max_chars: usize) -> String {
    heading.chars().take(max_chars).collect()
}

/// Lowercase hex SHA-256 of `heading + "\n" + body`.
pub fn chunk_hash(heading: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(heading.as_bytes());
    hasher.update(b"\n");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
