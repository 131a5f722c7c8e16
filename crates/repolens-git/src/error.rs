// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for repolens-git

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during git operations
#[derive(Debug, Error)]
pub enum GitError {
    /// Error from git2 library
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// I/O error while touching the working copy
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Repository not found at the specified path
    #[error("Repository not found: {path}")]
    RepositoryNotFound {
        /// The path that was searched for a repository
        path: String,
    },

    /// Invalid commit reference (branch, tag, or SHA)
    #[error("Invalid commit reference: {reference}")]
    InvalidReference {
        /// The reference string that could not be resolved
        reference: String,
    },

    /// The working copy could not be obtained (fatal for an analysis)
    #[error("Failed to acquire repository {reference}: {reason}")]
    Acquisition {
        /// The repository URL or path that was requested
        reference: String,
        /// Why acquisition failed
        reason: String,
    },

    /// The local path is already claimed by another analysis in this process
    #[error("Working copy is busy: {}", path.display())]
    Busy {
        /// The claimed local path
        path: PathBuf,
    },

    /// An external `git` invocation exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed
        command: String,
        /// Captured standard error
        stderr: String,
    },
}

impl GitError {
    /// Build an acquisition error for `reference`
    pub(crate) fn acquisition(reference: &str, reason: impl ToString) -> Self {
        Self::Acquisition {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts an analysis
    #[must_use]
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::Acquisition { .. } | Self::Busy { .. })
    }
}
