// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Working-copy management
//!
//! Obtains a local working copy (reuse-or-clone), moves it between commits
//! with [`CheckoutGuard`], and removes copies this process created.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{HeadRef, VcsBackend};
use crate::error::GitError;

/// Identifies the repository to analyze
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryReference {
    /// Clone URL or local path
    pub url: String,
    /// Commit to analyze instead of HEAD
    pub commit: Option<String>,
    /// Where the working copy lives (or should be cloned to)
    pub local_path: Option<PathBuf>,
}

impl RepositoryReference {
    /// Reference a repository by URL or path
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            commit: None,
            local_path: None,
        }
    }

    /// Pin the analysis to a commit
    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Use or create the working copy at `path`
    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    /// Repository name: the last URL segment without a `.git` suffix
    #[must_use]
    pub fn name(&self) -> String {
        let trimmed = self.url.trim_end_matches(['/', '\\']);
        let last = trimmed.rsplit(['/', '\\', ':']).next().unwrap_or(trimmed);
        let name = last.strip_suffix(".git").unwrap_or(last);
        if name.is_empty() {
            "repository".to_string()
        } else {
            name.to_string()
        }
    }

    /// Directory name safe to create under a base directory
    #[must_use]
    pub fn dir_name(&self) -> String {
        let sanitized: String = self
            .name()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if sanitized.chars().all(|c| c == '.') {
            "repository".to_string()
        } else {
            sanitized
        }
    }
}

// ============================================================================
// Path claims
// ============================================================================

fn claims() -> &'static Mutex<HashSet<PathBuf>> {
    static CLAIMS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    CLAIMS.get_or_init(Default::default)
}

/// Exclusive in-process claim on a working-copy path
#[derive(Debug)]
struct PathClaim {
    path: PathBuf,
}

impl PathClaim {
    fn acquire(path: &Path) -> Result<Self, GitError> {
        let path = std::path::absolute(path)?;
        let mut set = claims().lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(path.clone()) {
            return Err(GitError::Busy { path });
        }
        Ok(Self { path })
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        claims()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

// ============================================================================
// Handle
// ============================================================================

/// A working copy obtained for one analysis
///
/// Dropping the handle releases it; call [`LocalRepoHandle::release`] to
/// observe cleanup failures.
#[derive(Debug)]
pub struct LocalRepoHandle {
    path: PathBuf,
    created: bool,
    original_head: Option<HeadRef>,
    released: bool,
    _claim: PathClaim,
}

impl LocalRepoHandle {
    /// Root of the working copy
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this process cloned the copy (and will delete it)
    #[must_use]
    pub fn created(&self) -> bool {
        self.created
    }

    /// HEAD when the copy was obtained (`None` for an empty repository)
    #[must_use]
    pub fn original_head(&self) -> Option<&HeadRef> {
        self.original_head.as_ref()
    }

    /// Return the checkout to the ref it had when obtained
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the original ref cannot be checked out.
    pub fn restore(&self, backend: &dyn VcsBackend) -> Result<(), GitError> {
        match &self.original_head {
            Some(head) => restore(backend, &self.path, head),
            None => Ok(()),
        }
    }

    /// Delete the working copy if this process created it
    ///
    /// Idempotent; a missing path is not an error.
    ///
    /// # Errors
    ///
    /// Returns `GitError::Io` if the directory exists but cannot be removed.
    pub fn release(&mut self) -> Result<(), GitError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.created {
            release_path(&self.path)?;
            info!(path = %self.path.display(), "removed working copy");
        }
        Ok(())
    }

    /// Leave the working copy on disk and return its path
    #[must_use]
    pub fn keep(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for LocalRepoHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "failed to remove working copy");
        }
    }
}

/// Recursively delete `path`, tolerating its absence
///
/// # Errors
///
/// Returns `GitError::Io` for any failure other than "not found".
pub fn release_path(path: &Path) -> Result<(), GitError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Check out `original` unless HEAD already points there
///
/// # Errors
///
/// Returns `GitError` if the checkout fails.
pub fn restore(backend: &dyn VcsBackend, workdir: &Path, original: &HeadRef) -> Result<(), GitError> {
    if backend.head(workdir).ok().as_ref() == Some(original) {
        return Ok(());
    }
    backend.checkout(workdir, original.as_checkout_target())?;
    debug!(target = original.as_checkout_target(), "restored checkout");
    Ok(())
}

// ============================================================================
// Manager
// ============================================================================

/// Obtains working copies under a base directory
#[derive(Debug, Clone)]
pub struct WorkingCopyManager {
    base_dir: PathBuf,
}

impl WorkingCopyManager {
    /// Clone targets are created under `base_dir`
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory for clones
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Deterministic clone target for `reference`
    #[must_use]
    pub fn target_for(&self, reference: &RepositoryReference) -> PathBuf {
        reference
            .local_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join(reference.dir_name()))
    }

    /// Reuse an existing working copy or clone a fresh one
    ///
    /// Checked in order: the `local_path` hint, a URL that is itself a
    /// working copy, then the cached clone target. A bare repository on
    /// disk is cloned like a remote. Existing copies are used as-is (no
    /// fetch).
    ///
    /// # Errors
    ///
    /// Returns `GitError::Acquisition` if the clone fails or the target
    /// exists but is not a repository, and `GitError::Busy` if another
    /// analysis in this process holds the path.
    pub fn obtain(
        &self,
        backend: &dyn VcsBackend,
        reference: &RepositoryReference,
    ) -> Result<LocalRepoHandle, GitError> {
        let as_path = Path::new(&reference.url);
        if reference.local_path.is_none() && as_path.is_dir() {
            if backend.is_repository(as_path) {
                return Self::reuse(backend, as_path);
            }
            if !backend.is_bare_repository(as_path) {
                return Err(GitError::acquisition(
                    &reference.url,
                    "local directory is not a git repository",
                ));
            }
            debug!(path = %as_path.display(), "cloning from bare repository");
        }

        let target = self.target_for(reference);
        if backend.is_repository(&target) {
            return Self::reuse(backend, &target);
        }

        let existed = target.exists();
        if existed && !is_empty_dir(&target) {
            return Err(GitError::acquisition(
                &reference.url,
                format!("{} exists and is not a git repository", target.display()),
            ));
        }

        let claim = PathClaim::acquire(&target)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GitError::acquisition(&reference.url, e))?;
        }

        info!(url = %reference.url, target = %target.display(), backend = backend.name(), "cloning repository");
        if let Err(e) = backend.clone_repo(&reference.url, &target) {
            if !existed {
                if let Err(cleanup) = release_path(&target) {
                    warn!(path = %target.display(), error = %cleanup, "failed to remove partial clone");
                }
            }
            return Err(GitError::acquisition(&reference.url, e));
        }

        Ok(LocalRepoHandle {
            original_head: backend.head(&target).ok(),
            path: target,
            created: true,
            released: false,
            _claim: claim,
        })
    }

    fn reuse(backend: &dyn VcsBackend, path: &Path) -> Result<LocalRepoHandle, GitError> {
        let claim = PathClaim::acquire(path)?;
        debug!(path = %path.display(), "reusing existing working copy");
        Ok(LocalRepoHandle {
            original_head: backend.head(path).ok(),
            path: path.to_path_buf(),
            created: false,
            released: false,
            _claim: claim,
        })
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

// ============================================================================
// Scoped checkout
// ============================================================================

/// Transient checkout that restores the original ref when dropped
pub struct CheckoutGuard<'a> {
    backend: &'a dyn VcsBackend,
    workdir: &'a Path,
    original: Option<HeadRef>,
}

impl<'a> CheckoutGuard<'a> {
    /// Record HEAD, then check out `target`
    ///
    /// # Errors
    ///
    /// Returns `GitError` if HEAD cannot be read or the checkout fails; the
    /// working copy is left untouched in that case.
    pub fn checkout(
        backend: &'a dyn VcsBackend,
        workdir: &'a Path,
        target: &str,
    ) -> Result<Self, GitError> {
        let original = backend.head(workdir)?;
        backend.checkout(workdir, target)?;
        Ok(Self {
            backend,
            workdir,
            original: Some(original),
        })
    }

    /// Restore now and report failures
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the original ref cannot be checked out.
    pub fn restore(mut self) -> Result<(), GitError> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<(), GitError> {
        match self.original.take() {
            Some(original) => restore(self.backend, self.workdir, &original),
            None => Ok(()),
        }
    }
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_inner() {
            warn!(path = %self.workdir.display(), error = %e, "failed to restore checkout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_name_from_https_url() {
        let reference = RepositoryReference::new("https://github.com/Rbfinch/repolens.git");
        assert_eq!(reference.name(), "repolens");
    }

    #[test]
    fn test_name_from_scp_url() {
        assert_eq!(RepositoryReference::new("git@github.com:owner/tool.git").name(), "tool");
        assert_eq!(RepositoryReference::new("git@host:tool.git").name(), "tool");
    }

    #[test]
    fn test_name_from_local_path_with_trailing_slash() {
        assert_eq!(RepositoryReference::new("/srv/repos/widget/").name(), "widget");
    }

    #[test]
    fn test_name_fallback() {
        assert_eq!(RepositoryReference::new("").name(), "repository");
        assert_eq!(RepositoryReference::new(".git").name(), "repository");
    }

    #[test]
    fn test_dir_name_sanitizes() {
        let reference = RepositoryReference::new("https://example.com/a/we ird$name");
        assert_eq!(reference.dir_name(), "we_ird_name");
        assert_eq!(RepositoryReference::new("https://example.com/..").dir_name(), "repository");
    }

    #[test]
    fn test_target_prefers_local_path() {
        let manager = WorkingCopyManager::new("/cache/repos");
        let reference = RepositoryReference::new("https://example.com/x/tool.git");
        assert_eq!(manager.target_for(&reference), PathBuf::from("/cache/repos/tool"));

        let hinted = reference.with_local_path("/work/tool");
        assert_eq!(manager.target_for(&hinted), PathBuf::from("/work/tool"));
    }

    #[test]
    fn test_release_path_tolerates_missing() {
        assert!(release_path(Path::new("/nonexistent/repolens/release")).is_ok());
    }

    #[test]
    fn test_path_claim_is_exclusive() {
        let path = std::env::temp_dir().join("repolens-claim-test");
        let first = PathClaim::acquire(&path).expect("first claim");
        assert!(matches!(PathClaim::acquire(&path), Err(GitError::Busy { .. })));
        drop(first);
        assert!(PathClaim::acquire(&path).is_ok());
    }
}
