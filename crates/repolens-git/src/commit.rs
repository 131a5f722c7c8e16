//! Commit metadata produced by the history reader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one visited commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// The commit hash (40 hex characters)
    pub hash: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp, serialized as ISO 8601
    pub timestamp: DateTime<Utc>,
    /// Full commit message
    pub message: String,
}

impl CommitRecord {
    /// Validate that a hash is a valid 40-character hex string
    #[must_use]
    pub fn is_valid_hash(hash: &str) -> bool {
        hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Get the short hash (first 7 characters)
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }

    /// Get the first line of the commit message (subject)
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim_end()
    }
}
