// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! repolens-tree: filtered file-tree scanning for repolens
//!
//! This library crate walks a working copy, applies the ignore-pattern,
//! binary and artifact exclusion policy, and returns an owned tree of
//! [`TreeNode`] values with `/`-separated relative paths.

#![warn(missing_docs)]

pub mod error;
pub mod node;
pub mod policy;
pub mod readme;
pub mod scanner;

pub use error::ScanError;
pub use node::{DirectoryNode, FileNode, TreeNode, directory_count, files};
pub use policy::{DEFAULT_IGNORE_PATTERNS, ExclusionPolicy, Verdict};
pub use readme::{find_readme, read_description};
pub use scanner::{DEFAULT_MAX_DEPTH, ScanOptions, scan};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::ScanError;
    pub use crate::node::{FileNode, TreeNode};
    pub use crate::scanner::{ScanOptions, scan};
}
