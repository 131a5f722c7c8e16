// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Filtered, depth-capped directory scanning
//!
//! Entries come from a `walkdir` traversal in depth-first order and are
//! folded into nested nodes with a stack of open directories.
//!
//! # Example
//!
//! ```no_run
//! use repolens_tree::{ScanOptions, scan};
//!
//! let options = ScanOptions::default().with_content().with_max_file_size_kb(500);
//! let tree = scan(".", &options).expect("scan");
//! println!("{} top-level entries", tree.len());
//! ```

use std::cmp::Ordering;
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::ScanError;
use crate::node::{DirectoryNode, FileNode, TreeNode};
use crate::policy::{DEFAULT_IGNORE_PATTERNS, ExclusionPolicy, Verdict};

/// Default cap on tree depth
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Options for [`scan`]
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Literal substrings; any path containing one is left out
    pub ignore_patterns: Vec<String>,
    /// Capture UTF-8 file content
    pub include_content: bool,
    /// Files larger than this are listed without content
    pub max_file_size_kb: Option<u64>,
    /// Deepest level listed; directories at this level have no children
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(ToString::to_string).collect(),
            include_content: false,
            max_file_size_kb: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ScanOptions {
    /// Replace the ignore patterns
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Capture file content
    #[must_use]
    pub fn with_content(mut self) -> Self {
        self.include_content = true;
        self
    }

    /// Limit content capture by size
    #[must_use]
    pub fn with_max_file_size_kb(mut self, kb: u64) -> Self {
        self.max_file_size_kb = Some(kb);
        self
    }

    /// Set the depth cap
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn policy(&self) -> ExclusionPolicy {
        ExclusionPolicy::new(self.ignore_patterns.iter().cloned())
            .with_max_file_size_kb(self.max_file_size_kb)
    }
}

/// Scan `root` and return its top-level entries
///
/// Symlinks are never followed or listed. Unreadable entries are logged and
/// left out.
///
/// # Errors
///
/// Returns `ScanError` if `root` is missing, not a directory, or cannot be
/// listed.
pub fn scan(root: impl AsRef<Path>, options: &ScanOptions) -> Result<Vec<TreeNode>, ScanError> {
    let root = root.as_ref();
    if !root.exists() {
        return Err(ScanError::RootNotFound {
            path: root.display().to_string(),
        });
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.display().to_string(),
        });
    }

    let policy = options.policy();
    let max_depth = options.max_depth.max(1);
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by(directories_first)
        .into_iter()
        .filter_entry(|entry| keep_entry(root, entry, &policy));

    let mut top_level = Vec::new();
    let mut open: Vec<DirectoryNode> = Vec::new();
    let mut files_seen = 0usize;

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(ScanError::Io(e.into())),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        // Close directories that are not ancestors of this entry
        while open.len() >= entry.depth() {
            close_directory(&mut open, &mut top_level);
        }

        let metadata = entry
            .metadata()
            .inspect_err(|e| warn!(path = %entry.path().display(), error = %e, "entry without metadata"))
            .ok();
        let name = entry.file_name().to_string_lossy().into_owned();
        let relative_path = relative_path(root, entry.path());
        if entry.file_type().is_dir() {
            if entry.depth() == max_depth {
                debug!(path = %relative_path, depth = max_depth, "depth cap reached");
            }
            open.push(DirectoryNode {
                last_modified: modified(metadata.as_ref()),
                name,
                relative_path,
                children: Vec::new(),
            });
        } else if let Some(metadata) = metadata
            && let Some(file) = file_node(entry.path(), name, relative_path, &metadata, &policy, options)
        {
            files_seen += 1;
            match open.last_mut() {
                Some(parent) => parent.children.push(TreeNode::File(file)),
                None => top_level.push(TreeNode::File(file)),
            }
        }
    }
    while !open.is_empty() {
        close_directory(&mut open, &mut top_level);
    }

    info!(root = %root.display(), files = files_seen, "scanned tree");
    Ok(top_level)
}

/// Directories first, then by name
fn directories_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.file_type()
        .is_dir()
        .cmp(&a.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Prune symlinks and ignored directories before they are descended into
fn keep_entry(root: &Path, entry: &DirEntry, policy: &ExclusionPolicy) -> bool {
    if entry.path_is_symlink() {
        debug!(path = %entry.path().display(), "skipping symlink");
        return false;
    }
    if entry.file_type().is_dir() {
        let relative = relative_path(root, entry.path());
        if policy.directory_verdict(&relative) == Verdict::Exclude {
            debug!(path = %relative, "ignored directory");
            return false;
        }
    }
    true
}

fn close_directory(open: &mut Vec<DirectoryNode>, top_level: &mut Vec<TreeNode>) {
    let Some(dir) = open.pop() else { return };
    match open.last_mut() {
        Some(parent) => parent.children.push(TreeNode::Directory(dir)),
        None => top_level.push(TreeNode::Directory(dir)),
    }
}

/// Forward-slash path of `path` below `root`
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_node(
    path: &Path,
    name: String,
    relative_path: String,
    metadata: &Metadata,
    policy: &ExclusionPolicy,
    options: &ScanOptions,
) -> Option<FileNode> {
    let size_bytes = metadata.len();
    let verdict = policy.file_verdict(&relative_path, &name, size_bytes);
    if verdict == Verdict::Exclude {
        debug!(path = %relative_path, "excluded file");
        return None;
    }

    let content = if options.include_content && verdict == Verdict::Include {
        match fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes).ok(),
            Err(e) => {
                warn!(path = %relative_path, error = %e, "skipping unreadable file");
                return None;
            }
        }
    } else {
        None
    };

    let extension = Path::new(&name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());

    Some(FileNode {
        last_modified: modified(Some(metadata)),
        name,
        relative_path,
        size_bytes,
        extension,
        content,
    })
}

fn modified(metadata: Option<&Metadata>) -> DateTime<Utc> {
    metadata
        .and_then(|m| m.modified().ok())
        .map_or_else(|| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH), DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_missing_root() {
        let result = scan("/nonexistent/repolens/scan", &ScanOptions::default());
        assert!(matches!(result, Err(ScanError::RootNotFound { .. })));
    }

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!options.include_content);
        assert!(options.ignore_patterns.iter().any(|p| p == ".git/"));
    }

    #[test]
    fn test_builder() {
        let options = ScanOptions::default()
            .with_ignore_patterns(["vendor"])
            .with_content()
            .with_max_file_size_kb(4)
            .with_max_depth(2);
        assert_eq!(options.ignore_patterns, vec!["vendor".to_string()]);
        assert!(options.include_content);
        assert_eq!(options.max_file_size_kb, Some(4));
        assert_eq!(options.max_depth, 2);
    }
}
