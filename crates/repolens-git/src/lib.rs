// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! repolens-git: working copies, history and change-sets for repolens
//!
//! This library crate obtains a local working copy of a repository, reads
//! its recent history and extracts the change-set of the newest commit.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use repolens_git::{BackendKind, RepositoryReference, WorkingCopyManager};
//!
//! let backend = BackendKind::Git2.build();
//! let manager = WorkingCopyManager::new("/tmp/repolens");
//! let reference = RepositoryReference::new("https://github.com/Rbfinch/repolens.git");
//! let handle = manager.obtain(backend.as_ref(), &reference).expect("obtain");
//!
//! let commits = repolens_git::recent_commits(backend.as_ref(), &handle, "HEAD", 10);
//! if let [newest, previous, ..] = commits.as_slice() {
//!     let changes = repolens_git::changes(backend.as_ref(), &handle, &previous.hash, &newest.hash);
//!     println!("{} files changed", changes.len());
//! }
//! ```

pub mod backend;
pub mod changes;
pub mod commit;
pub mod error;
pub mod history;
pub mod working_copy;

pub use backend::{BackendKind, Git2Backend, GitCliBackend, HeadRef, VcsBackend};
pub use changes::{ChangeStatus, FileChange, changes, try_changes};
pub use commit::CommitRecord;
pub use error::GitError;
pub use history::{recent_commits, try_recent_commits};
pub use working_copy::{CheckoutGuard, LocalRepoHandle, RepositoryReference, WorkingCopyManager};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::{BackendKind, VcsBackend};
    pub use crate::changes::{ChangeStatus, FileChange};
    pub use crate::commit::CommitRecord;
    pub use crate::error::GitError;
    pub use crate::working_copy::{LocalRepoHandle, RepositoryReference, WorkingCopyManager};
}
