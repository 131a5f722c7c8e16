// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Analysis pipeline
//!
//! Runs acquisition, history, change-set, tree scan and synthesis in order.
//! Acquisition is the only fatal stage; every later stage degrades to an
//! empty result and records an [`AnalysisWarning`]. The working copy is
//! restored and released on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use repolens::pipeline::{AnalysisRequest, Analyzer, Cancellation};
//! use repolens_git::{BackendKind, RepositoryReference, WorkingCopyManager};
//!
//! let analyzer = Analyzer::new(BackendKind::Git2.build(), WorkingCopyManager::new("/tmp/repolens"));
//! let request = AnalysisRequest::new(RepositoryReference::new("https://github.com/Rbfinch/repolens.git"))
//!     .with_max_commits(5);
//! let analysis = analyzer.analyze(&request, &Cancellation::new()).expect("analysis");
//! println!("{}", analysis.context.digest_markdown);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use repolens_git::{
    CheckoutGuard, GitError, HeadRef, LocalRepoHandle, RepositoryReference, VcsBackend,
    WorkingCopyManager, try_changes, try_recent_commits,
};
use repolens_tree::{DEFAULT_IGNORE_PATTERNS, DEFAULT_MAX_DEPTH, ScanOptions, find_readme, read_description, scan};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::{DigestLimits, RepositoryContext, SynthesisInput, synthesize};

/// Default number of commits read
pub const DEFAULT_MAX_COMMITS: usize = 10;

/// Default content-capture limit in kilobytes
pub const DEFAULT_MAX_FILE_SIZE_KB: u64 = 500;

/// Pattern that keeps version-control metadata out of every scan
const VCS_METADATA_PATTERN: &str = ".git/";

// ============================================================================
// Request
// ============================================================================

/// Options for one analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Repository to analyze
    pub reference: RepositoryReference,
    /// Commits to read, newest first
    pub max_commits: usize,
    /// Files larger than this are listed without content
    pub max_file_size_kb: Option<u64>,
    /// Literal substrings excluded from the tree
    pub ignore_patterns: Vec<String>,
    /// Capture file content in the tree
    pub include_content: bool,
    /// Tree depth cap
    pub max_depth: usize,
    /// Leave a cloned working copy on disk afterwards
    pub keep_working_copy: bool,
    /// Digest size bounds
    pub digest_limits: DigestLimits,
}

impl AnalysisRequest {
    /// Request with default options
    #[must_use]
    pub fn new(reference: RepositoryReference) -> Self {
        Self {
            reference,
            max_commits: DEFAULT_MAX_COMMITS,
            max_file_size_kb: Some(DEFAULT_MAX_FILE_SIZE_KB),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(ToString::to_string).collect(),
            include_content: false,
            max_depth: DEFAULT_MAX_DEPTH,
            keep_working_copy: false,
            digest_limits: DigestLimits::default(),
        }
    }

    /// Set the number of commits read
    #[must_use]
    pub fn with_max_commits(mut self, max_commits: usize) -> Self {
        self.max_commits = max_commits;
        self
    }

    /// Set the content-capture limit
    #[must_use]
    pub fn with_max_file_size_kb(mut self, kb: Option<u64>) -> Self {
        self.max_file_size_kb = kb;
        self
    }

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

    /// Set the tree depth cap
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Keep a cloned working copy after the analysis
    #[must_use]
    pub fn keep_working_copy(mut self) -> Self {
        self.keep_working_copy = true;
        self
    }

    /// Set the digest bounds
    #[must_use]
    pub fn with_digest_limits(mut self, limits: DigestLimits) -> Self {
        self.digest_limits = limits;
        self
    }

    /// Scan options for this request; `.git/` is always ignored
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        let mut patterns = self.ignore_patterns.clone();
        if !patterns.iter().any(|p| p == VCS_METADATA_PATTERN || p == ".git") {
            patterns.push(VCS_METADATA_PATTERN.to_string());
        }
        let mut options = ScanOptions::default()
            .with_ignore_patterns(patterns)
            .with_max_depth(self.max_depth);
        options.include_content = self.include_content;
        options.max_file_size_kb = self.max_file_size_kb;
        options
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Obtaining the working copy
    Acquisition,
    /// Reading commit history
    History,
    /// Extracting the newest change-set
    Changes,
    /// Scanning the file tree
    Scan,
    /// Rendering the digest
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Acquisition => "acquisition",
            Self::History => "history",
            Self::Changes => "changes",
            Self::Scan => "scan",
            Self::Synthesis => "synthesis",
        })
    }
}

/// Caller-controlled cancellation, checked before each stage
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A token that never trips on its own
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip once `deadline` has passed
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Trip once `timeout` has elapsed from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation; clones share the flag
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether the flag is set or the deadline has passed
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`AnalysisError::Cancelled`] if cancelled
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Cancelled` naming `stage`.
    pub fn check(&self, stage: Stage) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            info!(%stage, "analysis cancelled");
            return Err(AnalysisError::Cancelled { stage });
        }
        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Errors that abort an analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The working copy could not be obtained or the pinned commit is invalid
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] GitError),

    /// Cancelled before `stage` started
    #[error("Analysis cancelled before {stage}")]
    Cancelled {
        /// The stage that did not run
        stage: Stage,
    },
}

/// A recovered failure reported alongside the context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisWarning {
    /// The log could not be read; commits are empty
    HistoryUnavailable {
        /// Underlying failure
        reason: String,
    },
    /// The change-set could not be computed; changes are empty
    DiffUnavailable {
        /// Underlying failure
        reason: String,
    },
    /// The tree could not be scanned; the tree is empty
    ScanUnavailable {
        /// Underlying failure
        reason: String,
    },
    /// The working copy could not be returned to its original ref
    RestoreFailure {
        /// Underlying failure
        reason: String,
    },
    /// The working copy could not be removed
    CleanupFailure {
        /// Working-copy path
        path: String,
        /// Underlying failure
        reason: String,
    },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HistoryUnavailable { reason } => write!(f, "history unavailable: {reason}"),
            Self::DiffUnavailable { reason } => write!(f, "change-set unavailable: {reason}"),
            Self::ScanUnavailable { reason } => write!(f, "tree scan unavailable: {reason}"),
            Self::RestoreFailure { reason } => write!(f, "could not restore checkout: {reason}"),
            Self::CleanupFailure { path, reason } => {
                write!(f, "could not remove working copy {path}: {reason}")
            }
        }
    }
}

/// A completed analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// The synthesized context
    pub context: RepositoryContext,
    /// Recovered failures, in the order they occurred
    pub warnings: Vec<AnalysisWarning>,
}

// ============================================================================
// Analyzer
// ============================================================================

/// Runs analyses with one backend under one base directory
pub struct Analyzer {
    backend: Box<dyn VcsBackend>,
    manager: WorkingCopyManager,
}

impl Analyzer {
    /// Create an analyzer
    #[must_use]
    pub fn new(backend: Box<dyn VcsBackend>, manager: WorkingCopyManager) -> Self {
        Self { backend, manager }
    }

    /// The version-control backend
    #[must_use]
    pub fn backend(&self) -> &dyn VcsBackend {
        self.backend.as_ref()
    }

    /// The working-copy manager
    #[must_use]
    pub fn manager(&self) -> &WorkingCopyManager {
        &self.manager
    }

    /// Analyze one repository
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Acquisition` if the working copy cannot be
    /// obtained or the pinned commit cannot be checked out, and
    /// `AnalysisError::Cancelled` if `cancel` trips between stages. Cleanup
    /// has run by the time either is returned.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &Cancellation,
    ) -> Result<Analysis, AnalysisError> {
        cancel.check(Stage::Acquisition)?;
        let handle = self.manager.obtain(self.backend(), &request.reference)?;
        info!(
            url = %request.reference.url,
            path = %handle.path().display(),
            backend = self.backend.name(),
            "obtained working copy"
        );

        let mut warnings = Vec::new();
        let outcome = self.run_stages(&handle, request, cancel, &mut warnings);
        finish(handle, request.keep_working_copy, &mut warnings);

        let context = outcome?;
        for warning in &warnings {
            warn!(%warning, "analysis completed with warning");
        }
        Ok(Analysis { context, warnings })
    }

    fn run_stages(
        &self,
        handle: &LocalRepoHandle,
        request: &AnalysisRequest,
        cancel: &Cancellation,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Result<RepositoryContext, AnalysisError> {
        let backend = self.backend();
        let workdir = handle.path();

        let pinned = match &request.reference.commit {
            Some(commit) => {
                debug!(commit, "checking out pinned commit");
                Some(CheckoutGuard::checkout(backend, workdir, commit)?)
            }
            None => None,
        };

        cancel.check(Stage::History)?;
        let commits = try_recent_commits(backend, handle, "HEAD", request.max_commits)
            .unwrap_or_else(|e| {
                warnings.push(AnalysisWarning::HistoryUnavailable {
                    reason: e.to_string(),
                });
                Vec::new()
            });

        cancel.check(Stage::Changes)?;
        let changes = match commits.as_slice() {
            [newest, previous, ..] => try_changes(backend, handle, &previous.hash, &newest.hash)
                .unwrap_or_else(|e| {
                    warnings.push(AnalysisWarning::DiffUnavailable {
                        reason: e.to_string(),
                    });
                    Vec::new()
                }),
            _ => {
                debug!(commits = commits.len(), "fewer than two commits; no change-set");
                Vec::new()
            }
        };

        cancel.check(Stage::Scan)?;
        let tree = scan(workdir, &request.scan_options()).unwrap_or_else(|e| {
            warnings.push(AnalysisWarning::ScanUnavailable {
                reason: e.to_string(),
            });
            Vec::new()
        });
        let readme = find_readme(workdir);
        let description = read_description(workdir, readme.as_deref());

        if let Some(guard) = pinned
            && let Err(e) = guard.restore()
        {
            warnings.push(AnalysisWarning::RestoreFailure {
                reason: e.to_string(),
            });
        }

        cancel.check(Stage::Synthesis)?;
        let input = SynthesisInput {
            url: request.reference.url.clone(),
            name: request.reference.name(),
            commits,
            changes,
            tree,
            readme,
            description,
            default_branch: handle
                .original_head()
                .and_then(HeadRef::branch)
                .map(ToString::to_string),
        };
        Ok(synthesize(input, &request.digest_limits))
    }
}

/// Release the working copy, or keep it when asked
fn finish(mut handle: LocalRepoHandle, keep: bool, warnings: &mut Vec<AnalysisWarning>) {
    if keep {
        let path = handle.keep();
        info!(path = %path.display(), "kept working copy");
        return;
    }
    if let Err(e) = handle.release() {
        warnings.push(AnalysisWarning::CleanupFailure {
            path: handle.path().display().to_string(),
            reason: e.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_request_defaults() {
        let request = AnalysisRequest::new(RepositoryReference::new("https://example.com/a.git"));
        assert_eq!(request.max_commits, 10);
        assert_eq!(request.max_file_size_kb, Some(500));
        assert_eq!(request.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!request.include_content);
        assert!(!request.keep_working_copy);
        assert!(request.ignore_patterns.iter().any(|p| p == "node_modules/"));
    }

    #[test]
    fn test_scan_options_always_ignore_vcs_metadata() {
        let request = AnalysisRequest::new(RepositoryReference::new("x"))
            .with_ignore_patterns(["node_modules"])
            .with_content()
            .with_max_file_size_kb(Some(4));
        let options = request.scan_options();
        assert_eq!(
            options.ignore_patterns,
            vec!["node_modules".to_string(), ".git/".to_string()]
        );
        assert!(options.include_content);
        assert_eq!(options.max_file_size_kb, Some(4));
    }

    #[test]
    fn test_scan_options_keep_explicit_git_pattern() {
        let request = AnalysisRequest::new(RepositoryReference::new("x")).with_ignore_patterns([".git"]);
        assert_eq!(request.scan_options().ignore_patterns, vec![".git".to_string()]);
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let cancel = Cancellation::new();
        let clone = cancel.clone();
        assert!(!cancel.is_cancelled());
        clone.cancel();
        assert!(cancel.is_cancelled());
        assert!(matches!(
            cancel.check(Stage::Scan),
            Err(AnalysisError::Cancelled { stage: Stage::Scan })
        ));
    }

    #[test]
    fn test_cancellation_deadline() {
        let past = Cancellation::new().with_deadline(Instant::now());
        assert!(past.is_cancelled());
        let future = Cancellation::new().with_timeout(Duration::from_secs(3600));
        assert!(!future.is_cancelled());
        assert!(future.check(Stage::History).is_ok());
    }

    #[test]
    fn test_warning_json_is_tagged() {
        let warning = AnalysisWarning::CleanupFailure {
            path: "/tmp/x".to_string(),
            reason: "busy".to_string(),
        };
        let json = serde_json::to_string(&warning).expect("serialize");
        assert_eq!(json, r#"{"kind":"cleanupFailure","path":"/tmp/x","reason":"busy"}"#);
        assert_eq!(warning.to_string(), "could not remove working copy /tmp/x: busy");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Changes.to_string(), "changes");
        assert_eq!(
            AnalysisError::Cancelled { stage: Stage::Scan }.to_string(),
            "Analysis cancelled before scan"
        );
    }
}
