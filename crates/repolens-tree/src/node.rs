//! Tree node types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// File name
    pub name: String,
    /// Path from the scan root, `/`-separated
    pub relative_path: String,
    /// Size on disk
    pub size_bytes: u64,
    /// Modification time
    pub last_modified: DateTime<Utc>,
    /// Extension without the dot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// UTF-8 content, when captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A scanned directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryNode {
    /// Directory name
    pub name: String,
    /// Path from the scan root, `/`-separated
    pub relative_path: String,
    /// Modification time
    pub last_modified: DateTime<Utc>,
    /// Directories first, then files, each sorted by name
    pub children: Vec<TreeNode>,
}

/// A node in the scanned tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// A file
    File(FileNode),
    /// A directory and its children
    Directory(DirectoryNode),
}

impl TreeNode {
    /// Entry name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(f) => &f.name,
            Self::Directory(d) => &d.name,
        }
    }

    /// Path from the scan root
    #[must_use]
    pub fn relative_path(&self) -> &str {
        match self {
            Self::File(f) => &f.relative_path,
            Self::Directory(d) => &d.relative_path,
        }
    }

    /// Whether this is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Number of files at or below this node
    #[must_use]
    pub fn file_count(&self) -> usize {
        files(std::slice::from_ref(self)).len()
    }
}

/// Every file in `nodes`, depth-first in tree order
#[must_use]
pub fn files(nodes: &[TreeNode]) -> Vec<&FileNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        match node {
            TreeNode::File(f) => out.push(f),
            TreeNode::Directory(d) => stack.extend(d.children.iter().rev()),
        }
    }
    out
}

/// Number of directories in `nodes`, recursively
#[must_use]
pub fn directory_count(nodes: &[TreeNode]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&TreeNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        if let TreeNode::Directory(d) = node {
            count += 1;
            stack.extend(d.children.iter());
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn file(path: &str) -> TreeNode {
        TreeNode::File(FileNode {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            relative_path: path.to_string(),
            size_bytes: 1,
            last_modified: DateTime::UNIX_EPOCH,
            extension: None,
            content: None,
        })
    }

    fn dir(path: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode::Directory(DirectoryNode {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            relative_path: path.to_string(),
            last_modified: DateTime::UNIX_EPOCH,
            children,
        })
    }

    fn sample() -> Vec<TreeNode> {
        vec![
            dir(
                "src",
                vec![dir("src/bin", vec![file("src/bin/main.rs")]), file("src/lib.rs")],
            ),
            dir("empty", vec![]),
            file("Cargo.toml"),
        ]
    }

    #[test]
    fn test_files_in_tree_order() {
        let tree = sample();
        let paths: Vec<&str> = files(&tree).iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["src/bin/main.rs", "src/lib.rs", "Cargo.toml"]);
    }

    #[test]
    fn test_counts() {
        let tree = sample();
        assert_eq!(tree[0].file_count(), 2);
        assert_eq!(tree[1].file_count(), 0);
        assert_eq!(directory_count(&tree), 3);
    }

    #[test]
    fn test_tree_node_json_is_tagged() {
        let json = serde_json::to_string(&file("a.txt")).expect("serialize");
        assert!(json.starts_with(r#"{"type":"file","name":"a.txt","relativePath":"a.txt""#));
        assert!(!json.contains("content"));
    }
}
