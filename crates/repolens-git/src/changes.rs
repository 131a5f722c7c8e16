// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Change-set extraction between two commits
//!
//! Three backend calls (name-status, numstat, full patch) are combined into
//! one [`FileChange`] per added, modified or deleted path. The patch is
//! requested once and partitioned per file by its `diff --git` header.

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::VcsBackend;
use crate::error::GitError;
use crate::working_copy::{CheckoutGuard, LocalRepoHandle};

/// Classified change status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Path exists only in the newer commit
    Added,
    /// Path changed between the commits
    Modified,
    /// Path exists only in the older commit
    Deleted,
}

impl ChangeStatus {
    /// Map a name-status code; renames, copies and other codes are unclassified
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Added),
            "M" => Some(Self::Modified),
            "D" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Lowercase label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path touched between two commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Path relative to the repository root
    pub path: String,
    /// Change status
    pub status: ChangeStatus,
    /// Lines added (absent for binary files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additions: Option<usize>,
    /// Lines deleted (absent for binary files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletions: Option<usize>,
    /// Unified diff for this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_text: Option<String>,
    /// Content at the newer commit (never set for deletions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

// ============================================================================
// Parsers
// ============================================================================

/// Parse `<code>\t<path>` lines, keeping classified entries in order
#[must_use]
pub fn parse_name_status(raw: &str) -> Vec<(ChangeStatus, String)> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let code = parts.next()?.trim();
            let path = parts.next()?;
            match ChangeStatus::from_code(code) {
                Some(status) if !path.is_empty() => Some((status, path.to_string())),
                _ => {
                    debug!(code, path, "skipping unclassified change");
                    None
                }
            }
        })
        .collect()
}

/// Parse numstat lines into `path -> (additions, deletions)`
///
/// Binary entries (`-\t-`) map to `None`.
#[must_use]
pub fn parse_numstat(raw: &str) -> HashMap<String, Option<(usize, usize)>> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let adds = parts.next()?;
            let dels = parts.next()?;
            let path = parts.next()?;
            let counts = match (adds.parse::<usize>(), dels.parse::<usize>()) {
                (Ok(a), Ok(d)) => Some((a, d)),
                _ if adds == "-" && dels == "-" => None,
                _ => return None,
            };
            Some((path.to_string(), counts))
        })
        .collect()
}

/// Split a unified diff into per-file sections keyed by their header line
///
/// Sections without a hunk (binary or mode-only changes) are dropped.
#[must_use]
pub fn split_unified_diff(raw: &str) -> HashMap<String, String> {
    let mut sections = HashMap::new();
    let mut current: Option<(String, String)> = None;

    for line in raw.split_inclusive('\n') {
        if line.starts_with("diff --git ") {
            if let Some((header, body)) = current.take() {
                insert_section(&mut sections, header, body);
            }
            current = Some((line.trim_end().to_string(), String::new()));
        }
        if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
        }
    }
    if let Some((header, body)) = current {
        insert_section(&mut sections, header, body);
    }
    sections
}

fn insert_section(sections: &mut HashMap<String, String>, header: String, body: String) {
    if body.lines().any(|line| line.starts_with("@@")) {
        sections.insert(header, body.trim_end_matches('\n').to_string());
    }
}

/// The `diff --git` header git emits for an unrenamed path
#[must_use]
pub fn diff_header(path: &str) -> String {
    format!("diff --git a/{path} b/{path}")
}

// ============================================================================
// Extraction
// ============================================================================

/// Compute the change-set between two commits
///
/// Failures are logged and yield an empty change-set.
#[must_use]
pub fn changes(
    backend: &dyn VcsBackend,
    handle: &LocalRepoHandle,
    from: &str,
    to: &str,
) -> Vec<FileChange> {
    match try_changes(backend, handle, from, to) {
        Ok(changes) => changes,
        Err(e) => {
            warn!(error = %e, from, to, "change-set unavailable");
            Vec::new()
        }
    }
}

/// Fallible form of [`changes`]
///
/// The working copy is checked out at `to` while contents are read and is
/// restored before returning, on success or failure.
///
/// # Errors
///
/// Returns `GitError` if any diff invocation fails.
pub fn try_changes(
    backend: &dyn VcsBackend,
    handle: &LocalRepoHandle,
    from: &str,
    to: &str,
) -> Result<Vec<FileChange>, GitError> {
    let workdir = handle.path();
    let entries = parse_name_status(&backend.diff_name_status(workdir, from, to)?);
    let stats = parse_numstat(&backend.diff_stat(workdir, from, to)?);
    let mut patches = split_unified_diff(&backend.diff_full(workdir, from, to)?);

    let mut changes: Vec<FileChange> = entries
        .into_iter()
        .map(|(status, path)| {
            let counts = stats.get(&path).copied().flatten();
            FileChange {
                diff_text: patches.remove(&diff_header(&path)),
                additions: counts.map(|(a, _)| a),
                deletions: counts.map(|(_, d)| d),
                content: None,
                status,
                path,
            }
        })
        .collect();

    if changes.iter().any(|c| c.status != ChangeStatus::Deleted) {
        read_contents(backend, handle, to, &mut changes);
    }

    debug!(count = changes.len(), from, to, "extracted change-set");
    Ok(changes)
}

fn read_contents(
    backend: &dyn VcsBackend,
    handle: &LocalRepoHandle,
    to: &str,
    changes: &mut [FileChange],
) {
    let workdir = handle.path();
    let guard = match CheckoutGuard::checkout(backend, workdir, to) {
        Ok(guard) => guard,
        Err(e) => {
            warn!(error = %e, to, "could not check out commit; file contents omitted");
            return;
        }
    };

    for change in changes.iter_mut().filter(|c| c.status != ChangeStatus::Deleted) {
        match fs::read_to_string(workdir.join(&change.path)) {
            Ok(content) => change.content = Some(content),
            Err(e) => debug!(path = %change.path, error = %e, "content omitted"),
        }
    }

    if let Err(e) = guard.restore() {
        warn!(error = %e, "failed to restore checkout after reading contents");
    }
}
