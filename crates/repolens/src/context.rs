// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Context synthesis
//!
//! Assembles history, change-set, tree and README metadata into a
//! [`RepositoryContext`] and renders its Markdown digest. Rendering is pure:
//! identical inputs produce a byte-identical digest.
//!
//! The digest always carries the same headings in the same order:
//!
//! ```text
//! # Repository Analysis: <name>
//! ## Repository Overview
//! ## Project Structure
//! ## Recent Commits
//! ## Recent Changes
//! ## README
//! ```

use std::fmt::{self, Write};

use repolens_git::{ChangeStatus, CommitRecord, FileChange};
use repolens_tree::{TreeNode, directory_count, files};
use serde::{Deserialize, Serialize};

/// Build and config files called out in the project structure
pub const KEY_FILE_NAMES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Gemfile",
    "composer.json",
    "tsconfig.json",
    "Makefile",
    "CMakeLists.txt",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    ".gitlab-ci.yml",
];

/// Default number of commits listed in the digest
pub const DEFAULT_DIGEST_COMMITS: usize = 10;

/// Default number of diff lines kept per changed file
pub const DEFAULT_MAX_DIFF_LINES: usize = 200;

/// The result of one analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryContext {
    /// URL or path the analysis was requested for
    pub url: String,
    /// Repository name
    pub name: String,
    /// One-paragraph description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// README text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    /// Branch checked out when the working copy was obtained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    /// Recent commits, newest first
    pub commits: Vec<CommitRecord>,
    /// Change-set of the newest commit
    pub file_changes: Vec<FileChange>,
    /// Scanned tree
    pub tree: Vec<TreeNode>,
    /// Rendered digest
    pub digest_markdown: String,
}

/// Everything the synthesizer consumes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisInput {
    /// URL or path of the repository
    pub url: String,
    /// Repository name
    pub name: String,
    /// Recent commits, newest first
    pub commits: Vec<CommitRecord>,
    /// Change-set of the newest commit
    pub changes: Vec<FileChange>,
    /// Scanned tree
    pub tree: Vec<TreeNode>,
    /// README text
    pub readme: Option<String>,
    /// One-paragraph description
    pub description: Option<String>,
    /// Default branch name
    pub default_branch: Option<String>,
}

/// Size bounds for the rendered digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestLimits {
    /// Commits listed under "Recent Commits"
    pub max_commits: usize,
    /// Diff lines kept per file before truncation
    pub max_diff_lines: usize,
}

impl Default for DigestLimits {
    fn default() -> Self {
        Self {
            max_commits: DEFAULT_DIGEST_COMMITS,
            max_diff_lines: DEFAULT_MAX_DIFF_LINES,
        }
    }
}

/// Build the context and its digest
#[must_use]
pub fn synthesize(input: SynthesisInput, limits: &DigestLimits) -> RepositoryContext {
    let digest_markdown = render_digest(&input, limits);
    RepositoryContext {
        url: input.url,
        name: input.name,
        description: input.description,
        readme: input.readme,
        default_branch: input.default_branch,
        commits: input.commits,
        file_changes: input.changes,
        tree: input.tree,
        digest_markdown,
    }
}

/// Render the Markdown digest for `input`
#[must_use]
pub fn render_digest(input: &SynthesisInput, limits: &DigestLimits) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_digest(&mut out, input, limits);
    out
}

/// Render only the project structure section for `tree`
#[must_use]
pub fn render_structure(tree: &[TreeNode]) -> String {
    let mut out = String::new();
    let _ = write_structure(&mut out, tree);
    out
}

fn write_digest(out: &mut String, input: &SynthesisInput, limits: &DigestLimits) -> fmt::Result {
    writeln!(out, "# Repository Analysis: {}", input.name)?;
    writeln!(out)?;
    write_overview(out, input)?;
    write_structure(out, &input.tree)?;
    write_commits(out, &input.commits, limits.max_commits)?;
    write_changes(out, &input.changes, limits.max_diff_lines)?;
    write_readme(out, input.readme.as_deref())
}

fn write_overview(out: &mut String, input: &SynthesisInput) -> fmt::Result {
    writeln!(out, "## Repository Overview")?;
    writeln!(out)?;
    writeln!(out, "- **URL:** {}", input.url)?;
    if let Some(branch) = &input.default_branch {
        writeln!(out, "- **Default branch:** {branch}")?;
    }
    if let Some(description) = &input.description {
        writeln!(out, "- **Description:** {description}")?;
    }
    writeln!(out, "- **Files:** {}", files(&input.tree).len())?;
    writeln!(out, "- **Directories:** {}", directory_count(&input.tree))?;
    writeln!(out, "- **Commits analyzed:** {}", input.commits.len())?;
    writeln!(out)
}

fn write_structure(out: &mut String, tree: &[TreeNode]) -> fmt::Result {
    writeln!(out, "## Project Structure")?;
    writeln!(out)?;

    let dirs: Vec<&TreeNode> = tree.iter().filter(|n| n.is_dir()).collect();
    let top_files: Vec<&TreeNode> = tree.iter().filter(|n| !n.is_dir()).collect();
    if dirs.is_empty() && top_files.is_empty() {
        writeln!(out, "_No files found._")?;
        return writeln!(out);
    }

    if !dirs.is_empty() {
        writeln!(out, "### Top-level directories")?;
        writeln!(out)?;
        for dir in dirs {
            let count = dir.file_count();
            let noun = if count == 1 { "file" } else { "files" };
            writeln!(out, "- `{}/` ({count} {noun})", dir.name())?;
        }
        writeln!(out)?;
    }

    if !top_files.is_empty() {
        writeln!(out, "### Top-level files")?;
        writeln!(out)?;
        for file in top_files {
            writeln!(out, "- `{}`", file.name())?;
        }
        writeln!(out)?;
    }

    let key_files = key_files(tree);
    if !key_files.is_empty() {
        writeln!(out, "### Key files")?;
        writeln!(out)?;
        for path in key_files {
            writeln!(out, "- `{path}`")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Paths of recognised build/config files, in tree order
#[must_use]
pub fn key_files(tree: &[TreeNode]) -> Vec<&str> {
    files(tree)
        .into_iter()
        .filter(|f| KEY_FILE_NAMES.contains(&f.name.as_str()))
        .map(|f| f.relative_path.as_str())
        .collect()
}

fn write_commits(out: &mut String, commits: &[CommitRecord], max_commits: usize) -> fmt::Result {
    writeln!(out, "## Recent Commits")?;
    writeln!(out)?;
    if commits.is_empty() || max_commits == 0 {
        writeln!(out, "_No commits available._")?;
        return writeln!(out);
    }
    for commit in commits.iter().take(max_commits) {
        writeln!(
            out,
            "- `{}` {} **{}**: {}",
            commit.short_hash(),
            commit.timestamp.format("%Y-%m-%d"),
            commit.author_name,
            commit.subject()
        )?;
    }
    writeln!(out)
}

fn write_changes(out: &mut String, changes: &[FileChange], max_diff_lines: usize) -> fmt::Result {
    writeln!(out, "## Recent Changes")?;
    writeln!(out)?;
    if changes.is_empty() {
        writeln!(out, "_No changes available._")?;
        return writeln!(out);
    }
    for change in changes {
        writeln!(out, "### `{}` ({})", change.path, change_summary(change))?;
        writeln!(out)?;
        if let Some(diff) = &change.diff_text {
            write_diff_block(out, diff, max_diff_lines)?;
        }
    }
    Ok(())
}

fn change_summary(change: &FileChange) -> String {
    match (change.additions, change.deletions) {
        (Some(adds), Some(dels)) => format!("{}, +{adds} -{dels}", change.status),
        _ if change.status == ChangeStatus::Deleted => change.status.to_string(),
        _ => format!("{}, binary", change.status),
    }
}

fn write_diff_block(out: &mut String, diff: &str, max_lines: usize) -> fmt::Result {
    let fence = fence_for(diff);
    writeln!(out, "{fence}diff")?;
    let total = diff.lines().count();
    for line in diff.lines().take(max_lines) {
        writeln!(out, "{line}")?;
    }
    if total > max_lines {
        writeln!(out, "... ({} more lines truncated)", total - max_lines)?;
    }
    writeln!(out, "{fence}")?;
    writeln!(out)
}

/// A backtick fence longer than any backtick run in `text`
#[must_use]
pub fn fence_for(text: &str) -> String {
    let mut longest = 0usize;
    let mut run = 0usize;
    for c in text.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn write_readme(out: &mut String, readme: Option<&str>) -> fmt::Result {
    writeln!(out, "## README")?;
    writeln!(out)?;
    match readme {
        Some(text) if !text.trim().is_empty() => {
            out.push_str(text);
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(())
        }
        _ => writeln!(out, "_No README found._"),
    }
}
