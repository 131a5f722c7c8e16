// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Commit history reader

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::backend::{LOG_FIELD_SEP, LOG_RECORD_SEP, VcsBackend};
use crate::commit::CommitRecord;
use crate::error::GitError;
use crate::working_copy::LocalRepoHandle;

/// Read up to `max_count` commits reachable from `rev`, newest first
///
/// Failures are logged and yield an empty list.
#[must_use]
pub fn recent_commits(
    backend: &dyn VcsBackend,
    handle: &LocalRepoHandle,
    rev: &str,
    max_count: usize,
) -> Vec<CommitRecord> {
    match try_recent_commits(backend, handle, rev, max_count) {
        Ok(commits) => commits,
        Err(e) => {
            warn!(error = %e, "commit history unavailable");
            Vec::new()
        }
    }
}

/// Fallible form of [`recent_commits`]
///
/// # Errors
///
/// Returns `GitError` if the backend cannot produce a log.
pub fn try_recent_commits(
    backend: &dyn VcsBackend,
    handle: &LocalRepoHandle,
    rev: &str,
    max_count: usize,
) -> Result<Vec<CommitRecord>, GitError> {
    if max_count == 0 {
        return Ok(Vec::new());
    }
    if rev == "HEAD" && backend.is_unborn(handle.path()) {
        debug!("HEAD is unborn; no history");
        return Ok(Vec::new());
    }
    let raw = backend.log(handle.path(), rev, max_count)?;
    let mut commits = parse_log(&raw);
    commits.truncate(max_count);
    debug!(count = commits.len(), rev, "read commit history");
    Ok(commits)
}

/// Parse a separator-delimited log stream
///
/// Malformed records are skipped.
#[must_use]
pub fn parse_log(raw: &str) -> Vec<CommitRecord> {
    raw.split(LOG_RECORD_SEP)
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let parsed = parse_record(record);
            if parsed.is_none() {
                debug!(record, "skipping malformed log record");
            }
            parsed
        })
        .collect()
}

fn parse_record(record: &str) -> Option<CommitRecord> {
    let mut fields = record.splitn(5, LOG_FIELD_SEP);
    let hash = fields.next()?.trim();
    let author_name = fields.next()?;
    let author_email = fields.next()?;
    let timestamp = fields.next()?;
    let message = fields.next()?;

    if !CommitRecord::is_valid_hash(hash) {
        return None;
    }
    let timestamp = DateTime::parse_from_rfc3339(timestamp.trim())
        .ok()?
        .with_timezone(&Utc);

    Some(CommitRecord {
        hash: hash.to_string(),
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        timestamp,
        message: message.trim_end().to_string(),
    })
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: the parser never panics and only yields valid hashes
        #[test]
        fn prop_parse_log_yields_valid_hashes(raw in "[\\PC\u{1e}\u{1f}\n]{0,200}") {
            for commit in parse_log(&raw) {
                prop_assert!(CommitRecord::is_valid_hash(&commit.hash));
            }
        }
    }
}
