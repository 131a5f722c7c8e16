// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Version-control backends
//!
//! Every backend emits git's plain-text formats (name-status, numstat,
//! unified patch and a separator-delimited log stream). Parsing lives in
//! [`crate::history`] and [`crate::changes`], so swapping `git2` for the
//! `git` binary does not touch the pipeline.

use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

use chrono::{SecondsFormat, TimeZone, Utc};
use git2::build::CheckoutBuilder;
use git2::{DiffFindOptions, DiffFormat, DiffOptions, ErrorCode, Patch, Repository, Sort};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GitError;

/// Separates fields inside one log record
pub const LOG_FIELD_SEP: char = '\u{1f}';
/// Terminates one log record
pub const LOG_RECORD_SEP: char = '\u{1e}';

/// Where HEAD pointed before a transient checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum HeadRef {
    /// HEAD is attached to a local branch (short name)
    Branch(String),
    /// HEAD is detached at a commit
    Detached(String),
}

impl HeadRef {
    /// The string to hand back to [`VcsBackend::checkout`]
    #[must_use]
    pub fn as_checkout_target(&self) -> &str {
        match self {
            Self::Branch(name) | Self::Detached(name) => name,
        }
    }

    /// Branch name, if HEAD is attached
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        match self {
            Self::Branch(name) => Some(name),
            Self::Detached(_) => None,
        }
    }
}

/// The narrow interface the pipeline needs from a version-control tool
pub trait VcsBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Clone `url` into `dest` (full clone)
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the clone fails.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// Whether `path` is the root of a working copy
    fn is_repository(&self, path: &Path) -> bool;

    /// Whether `path` is the root of a bare repository (no working tree)
    fn is_bare_repository(&self, path: &Path) -> bool;

    /// Whether HEAD names a branch that has no commits yet
    fn is_unborn(&self, workdir: &Path) -> bool;

    /// Up to `max_count` commits reachable from `rev`, newest first
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the log cannot be produced.
    fn log(&self, workdir: &Path, rev: &str, max_count: usize) -> Result<String, GitError>;

    /// `<code>\t<path>` lines between two commits
    ///
    /// # Errors
    ///
    /// Returns `GitError` if either commit cannot be resolved.
    fn diff_name_status(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError>;

    /// `<adds>\t<dels>\t<path>` lines between two commits
    ///
    /// # Errors
    ///
    /// Returns `GitError` if either commit cannot be resolved.
    fn diff_stat(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError>;

    /// Full unified diff between two commits
    ///
    /// # Errors
    ///
    /// Returns `GitError` if either commit cannot be resolved.
    fn diff_full(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError>;

    /// Check out a branch name or commit
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the reference is unknown or local changes
    /// would be overwritten.
    fn checkout(&self, workdir: &Path, reference: &str) -> Result<(), GitError>;

    /// Current HEAD
    ///
    /// # Errors
    ///
    /// Returns `GitError` if HEAD is unborn or unreadable.
    fn head(&self, workdir: &Path) -> Result<HeadRef, GitError>;
}

/// Which backend implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process `git2`
    #[default]
    Git2,
    /// The `git` executable on `PATH`
    Cli,
}

impl BackendKind {
    /// Instantiate the backend
    #[must_use]
    pub fn build(self) -> Box<dyn VcsBackend> {
        match self {
            Self::Git2 => Box::new(Git2Backend),
            Self::Cli => Box::new(GitCliBackend::default()),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "git2" | "libgit2" => Ok(Self::Git2),
            "cli" | "git" => Ok(Self::Cli),
            other => Err(format!("unknown backend '{other}' (expected git2 or cli)")),
        }
    }
}

// ============================================================================
// git2 backend
// ============================================================================

/// Backend built on `git2`
#[derive(Debug, Clone, Copy, Default)]
pub struct Git2Backend;

impl Git2Backend {
    fn open(workdir: &Path) -> Result<Repository, GitError> {
        Repository::open(workdir).map_err(|_| GitError::RepositoryNotFound {
            path: workdir.display().to_string(),
        })
    }

    fn resolve_tree<'r>(repo: &'r Repository, rev: &str) -> Result<git2::Tree<'r>, GitError> {
        let commit = repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| GitError::InvalidReference {
                reference: rev.to_string(),
            })?;
        Ok(commit.tree()?)
    }

    fn diff<'r>(
        repo: &'r Repository,
        from: &str,
        to: &str,
    ) -> Result<git2::Diff<'r>, GitError> {
        let old_tree = Self::resolve_tree(repo, from)?;
        let new_tree = Self::resolve_tree(repo, to)?;

        let mut opts = DiffOptions::new();
        opts.ignore_whitespace(false);
        let mut diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

        // Match `git diff` defaults so renames surface as R codes
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;
        Ok(diff)
    }

    fn delta_path(delta: &git2::DiffDelta<'_>) -> String {
        delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default()
    }
}

impl VcsBackend for Git2Backend {
    fn name(&self) -> &'static str {
        "git2"
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        Repository::clone(url, dest)?;
        Ok(())
    }

    fn is_repository(&self, path: &Path) -> bool {
        Repository::open(path).is_ok_and(|repo| !repo.is_bare())
    }

    fn is_bare_repository(&self, path: &Path) -> bool {
        Repository::open_bare(path).is_ok_and(|repo| repo.is_bare())
    }

    fn is_unborn(&self, workdir: &Path) -> bool {
        Self::open(workdir).is_ok_and(|repo| {
            matches!(repo.head(), Err(e) if e.code() == ErrorCode::UnbornBranch)
        })
    }

    fn log(&self, workdir: &Path, rev: &str, max_count: usize) -> Result<String, GitError> {
        let repo = Self::open(workdir)?;
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;
        let start = repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| GitError::InvalidReference {
                reference: rev.to_string(),
            })?;
        revwalk.push(start.id())?;

        let mut out = String::new();
        for oid in revwalk.take(max_count) {
            let commit = repo.find_commit(oid?)?;
            let author = commit.author();
            let timestamp = Utc
                .timestamp_opt(author.when().seconds(), 0)
                .single()
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default();
            let _ = write!(
                out,
                "{hash}{sep}{name}{sep}{email}{sep}{timestamp}{sep}{message}{LOG_RECORD_SEP}",
                hash = commit.id(),
                name = author.name().unwrap_or("Unknown"),
                email = author.email().unwrap_or(""),
                message = commit.message().unwrap_or(""),
                sep = LOG_FIELD_SEP,
            );
        }
        Ok(out)
    }

    fn diff_name_status(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError> {
        let repo = Self::open(workdir)?;
        let diff = Self::diff(&repo, from, to)?;

        let mut out = String::new();
        for delta in diff.deltas() {
            let code = match delta.status() {
                git2::Delta::Added => "A",
                git2::Delta::Deleted => "D",
                git2::Delta::Modified => "M",
                git2::Delta::Renamed => "R",
                git2::Delta::Copied => "C",
                git2::Delta::Typechange => "T",
                git2::Delta::Conflicted => "U",
                _ => "X",
            };
            if matches!(delta.status(), git2::Delta::Renamed | git2::Delta::Copied) {
                let old = delta
                    .old_file()
                    .path()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                let _ = writeln!(out, "{code}\t{old}\t{}", Self::delta_path(&delta));
            } else {
                let _ = writeln!(out, "{code}\t{}", Self::delta_path(&delta));
            }
        }
        Ok(out)
    }

    fn diff_stat(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError> {
        let repo = Self::open(workdir)?;
        let diff = Self::diff(&repo, from, to)?;

        let mut out = String::new();
        for idx in 0..diff.deltas().len() {
            let Some(patch) = Patch::from_diff(&diff, idx)? else {
                continue;
            };
            let delta = patch.delta();
            let path = Self::delta_path(&delta);
            if delta.flags().is_binary() {
                let _ = writeln!(out, "-\t-\t{path}");
            } else {
                let (_, additions, deletions) = patch.line_stats()?;
                let _ = writeln!(out, "{additions}\t{deletions}\t{path}");
            }
        }
        Ok(out)
    }

    fn diff_full(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError> {
        let repo = Self::open(workdir)?;
        let diff = Self::diff(&repo, from, to)?;

        let mut buf = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                buf.push(line.origin() as u8);
            }
            buf.extend_from_slice(line.content());
            true
        })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn checkout(&self, workdir: &Path, reference: &str) -> Result<(), GitError> {
        let repo = Self::open(workdir)?;
        let (object, resolved) =
            repo.revparse_ext(reference)
                .map_err(|_| GitError::InvalidReference {
                    reference: reference.to_string(),
                })?;

        let mut opts = CheckoutBuilder::new();
        opts.safe();
        repo.checkout_tree(&object, Some(&mut opts))?;

        match resolved.as_ref().filter(|r| r.is_branch()).and_then(|r| r.name()) {
            Some(name) => repo.set_head(name)?,
            None => repo.set_head_detached(object.peel_to_commit()?.id())?,
        }
        debug!(reference, "checked out");
        Ok(())
    }

    fn head(&self, workdir: &Path) -> Result<HeadRef, GitError> {
        let repo = Self::open(workdir)?;
        let head = repo.head()?;
        if repo.head_detached()? {
            let oid = head.target().ok_or_else(|| GitError::InvalidReference {
                reference: "HEAD".to_string(),
            })?;
            Ok(HeadRef::Detached(oid.to_string()))
        } else {
            Ok(HeadRef::Branch(head.shorthand().unwrap_or("HEAD").to_string()))
        }
    }
}

// ============================================================================
// git CLI backend
// ============================================================================

/// Backend that shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitCliBackend {
    program: String,
}

impl Default for GitCliBackend {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCliBackend {
    /// Use a specific git executable
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `git <subcommand> <args>` and return stdout
    fn run(&self, workdir: Option<&Path>, subcommand: &str, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        cmd.args(["-c", "core.quotepath=off", subcommand])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(GitError::Command {
                command: subcommand.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VcsBackend for GitCliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let dest = dest.to_string_lossy();
        self.run(None, "clone", &["--quiet", "--", url, &dest])?;
        Ok(())
    }

    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
            && self
                .run(Some(path), "rev-parse", &["--is-inside-work-tree"])
                .is_ok_and(|out| out.trim() == "true")
    }

    fn is_bare_repository(&self, path: &Path) -> bool {
        self.run(Some(path), "rev-parse", &["--is-bare-repository", "--git-dir"])
            .is_ok_and(|out| {
                let mut lines = out.lines().map(str::trim);
                lines.next() == Some("true") && lines.next() == Some(".")
            })
    }

    fn is_unborn(&self, workdir: &Path) -> bool {
        self.run(Some(workdir), "rev-parse", &["--verify", "--quiet", "HEAD"]).is_err()
            && self.run(Some(workdir), "symbolic-ref", &["--quiet", "HEAD"]).is_ok()
    }

    fn log(&self, workdir: &Path, rev: &str, max_count: usize) -> Result<String, GitError> {
        let count = format!("--max-count={max_count}");
        self.run(
            Some(workdir),
            "log",
            &[
                &count,
                "--format=%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1e",
                rev,
                "--",
            ],
        )
    }

    fn diff_name_status(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError> {
        self.run(Some(workdir), "diff", &["--no-color", "--name-status", from, to, "--"])
    }

    fn diff_stat(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError> {
        self.run(Some(workdir), "diff", &["--no-color", "--numstat", from, to, "--"])
    }

    fn diff_full(&self, workdir: &Path, from: &str, to: &str) -> Result<String, GitError> {
        self.run(
            Some(workdir),
            "diff",
            &["--no-color", "--no-ext-diff", from, to, "--"],
        )
    }

    fn checkout(&self, workdir: &Path, reference: &str) -> Result<(), GitError> {
        self.run(Some(workdir), "checkout", &["--quiet", reference])?;
        debug!(reference, "checked out");
        Ok(())
    }

    fn head(&self, workdir: &Path) -> Result<HeadRef, GitError> {
        if let Ok(branch) = self.run(Some(workdir), "symbolic-ref", &["--quiet", "--short", "HEAD"]) {
            return Ok(HeadRef::Branch(branch.trim().to_string()));
        }
        let sha = self.run(Some(workdir), "rev-parse", &["--verify", "HEAD"])?;
        Ok(HeadRef::Detached(sha.trim().to_string()))
    }
}
