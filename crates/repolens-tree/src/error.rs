// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for repolens-tree

use thiserror::Error;

/// Errors that abort a scan
///
/// Individual unreadable entries never surface here; they are logged and
/// left out of the tree.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root does not exist
    #[error("Scan root not found: {path}")]
    RootNotFound {
        /// The requested root
        path: String,
    },

    /// The scan root is not a directory
    #[error("Scan root is not a directory: {path}")]
    NotADirectory {
        /// The requested root
        path: String,
    },

    /// The scan root could not be listed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
