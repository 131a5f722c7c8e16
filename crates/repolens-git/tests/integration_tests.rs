// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Integration tests for repolens-git
//!
//! These tests scaffold real git repositories and run every scenario
//! against both the `git2` and the `git` CLI backends.


use repolens_git::{
    ChangeStatus, CheckoutGuard, CommitRecord, GitError, HeadRef, RepositoryReference,
    WorkingCopyManager, changes, recent_commits, try_changes, try_recent_commits,
};
use similar_asserts::assert_eq;
use test_utils::{TempTestDir, TestGitRepo, backends};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0xff, 0x00];

/// Three commits: c1 adds two files, c2 edits one, c3 adds/modifies/deletes
fn three_commit_repo(name: &str) -> (TestGitRepo, [String; 3]) {
    let repo = TestGitRepo::new(name);
    repo.write("README.md", "# Demo\n").write("src/lib.rs", "fn a() {}\n");
    let c1 = repo.commit("Initial commit");

    repo.write("src/lib.rs", "fn a() {}\nfn b() {}\n");
    let c2 = repo.commit("Add b");

    repo.write("src/lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\n")
        .write("src/new.rs", "pub struct New;\n")
        .write("assets/logo.png", PNG_BYTES)
        .remove("README.md");
    let c3 = repo.commit("Add c, new module and logo; drop README\n\nLonger body.");

    (repo, [c1, c2, c3])
}

fn obtain_local(
    backend: &dyn repolens_git::VcsBackend,
    repo: &TestGitRepo,
    base: &TempTestDir,
) -> repolens_git::LocalRepoHandle {
    let manager = WorkingCopyManager::new(base.path());
    let reference = RepositoryReference::new(repo.path().display().to_string());
    manager.obtain(backend, &reference).expect("obtain local repo")
}

// ============================================================================
// History
// ============================================================================

#[test]
fn test_history_returns_newest_first_bounded() {
    let (repo, [_, c2, c3]) = three_commit_repo("history_bounded");
    let base = TempTestDir::new("history_bounded_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        let commits = recent_commits(backend.as_ref(), &handle, "HEAD", 2);

        assert_eq!(commits.len(), 2, "backend {}", backend.name());
        assert_eq!(commits[0].hash, c3);
        assert_eq!(commits[1].hash, c2);
        assert!(commits[0].timestamp > commits[1].timestamp);
        assert_eq!(commits[0].subject(), "Add c, new module and logo; drop README");
        assert_eq!(commits[0].author_name, "Test Author");
        assert_eq!(commits[0].author_email, "test@example.com");
    }
}

#[test]
fn test_history_shorter_than_requested() {
    let (repo, _) = three_commit_repo("history_short");
    let base = TempTestDir::new("history_short_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        let commits = recent_commits(backend.as_ref(), &handle, "HEAD", 50);
        assert_eq!(commits.len(), 3);
        assert!(commits.iter().all(|c| CommitRecord::is_valid_hash(&c.hash)));
        for pair in commits.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }
}

#[test]
fn test_history_zero_count_and_empty_repository() {
    let (repo, _) = three_commit_repo("history_zero");
    let empty = TestGitRepo::new("history_empty");
    let base = TempTestDir::new("history_zero_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        assert!(recent_commits(backend.as_ref(), &handle, "HEAD", 0).is_empty());
        drop(handle);

        let handle = obtain_local(backend.as_ref(), &empty, &base);
        assert!(backend.is_unborn(handle.path()), "backend {}", backend.name());
        let history = try_recent_commits(backend.as_ref(), &handle, "HEAD", 10)
            .expect("an unborn HEAD is an empty history, not a failure");
        assert!(history.is_empty());
    }
}

#[test]
fn test_history_from_pinned_commit() {
    let (repo, [c1, c2, _]) = three_commit_repo("history_pinned");
    let base = TempTestDir::new("history_pinned_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        let commits = recent_commits(backend.as_ref(), &handle, &c2, 10);
        let hashes: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, vec![c2.as_str(), c1.as_str()]);
    }
}

// ============================================================================
// Change-set
// ============================================================================

#[test]
fn test_changes_reflect_only_newest_commit() {
    let (repo, [_, c2, c3]) = three_commit_repo("changes_newest");
    let base = TempTestDir::new("changes_newest_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        let set = try_changes(backend.as_ref(), &handle, &c2, &c3).expect("changes");

        let mut paths: Vec<(&str, ChangeStatus)> =
            set.iter().map(|c| (c.path.as_str(), c.status)).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                ("README.md", ChangeStatus::Deleted),
                ("assets/logo.png", ChangeStatus::Added),
                ("src/lib.rs", ChangeStatus::Modified),
                ("src/new.rs", ChangeStatus::Added),
            ],
            "backend {}",
            backend.name()
        );

        let lib = set.iter().find(|c| c.path == "src/lib.rs").expect("lib.rs");
        assert_eq!(lib.additions, Some(1));
        assert_eq!(lib.deletions, Some(0));
        let diff = lib.diff_text.as_deref().expect("diff text");
        assert!(diff.starts_with("diff --git a/src/lib.rs b/src/lib.rs"));
        assert!(diff.contains("+fn c() {}"));
        assert!(!diff.contains("new.rs"));
        assert_eq!(lib.content.as_deref(), Some("fn a() {}\nfn b() {}\nfn c() {}\n"));

        let readme = set.iter().find(|c| c.path == "README.md").expect("README");
        assert!(readme.content.is_none());
        assert_eq!(readme.deletions, Some(1));

        let logo = set.iter().find(|c| c.path == "assets/logo.png").expect("logo");
        assert!(logo.diff_text.is_none(), "binary diff should be absent");
        assert!(logo.additions.is_none());
        assert!(logo.content.is_none(), "non-UTF-8 content should be omitted");

        let new = set.iter().find(|c| c.path == "src/new.rs").expect("new.rs");
        assert_eq!(new.content.as_deref(), Some("pub struct New;\n"));
    }
}

#[test]
fn test_changes_restore_branch_after_reading_older_commit() {
    let (repo, [c1, c2, _]) = three_commit_repo("changes_restore_branch");
    let base = TempTestDir::new("changes_restore_branch_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        let set = changes(backend.as_ref(), &handle, &c1, &c2);

        let lib = set.iter().find(|c| c.path == "src/lib.rs").expect("lib.rs");
        assert_eq!(lib.content.as_deref(), Some("fn a() {}\nfn b() {}\n"));

        assert_eq!(repo.current_branch().as_deref(), Some("main"));
        let on_disk = std::fs::read_to_string(repo.path().join("src/lib.rs")).expect("read");
        assert_eq!(on_disk, "fn a() {}\nfn b() {}\nfn c() {}\n");
    }
}

#[test]
fn test_changes_restore_detached_head() {
    let (repo, [_, c2, c3]) = three_commit_repo("changes_restore_detached");
    repo.detach(&c2);
    let base = TempTestDir::new("changes_restore_detached_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        assert_eq!(handle.original_head(), Some(&HeadRef::Detached(c2.clone())));

        let set = changes(backend.as_ref(), &handle, &c2, &c3);
        assert!(!set.is_empty());
        assert_eq!(repo.current_branch(), None);
        assert_eq!(repo.head_sha(), c2);
    }
}

#[test]
fn test_changes_invalid_reference_degrades_to_empty() {
    let (repo, [_, _, c3]) = three_commit_repo("changes_invalid");
    let base = TempTestDir::new("changes_invalid_base");

    for backend in backends() {
        let handle = obtain_local(backend.as_ref(), &repo, &base);
        assert!(changes(backend.as_ref(), &handle, "no-such-ref", &c3).is_empty());
        assert!(try_changes(backend.as_ref(), &handle, "no-such-ref", &c3).is_err());
        assert_eq!(repo.current_branch().as_deref(), Some("main"));
    }
}

// ============================================================================
// Working copy
// ============================================================================

#[test]
fn test_obtain_reuses_local_repository_without_deleting() {
    let (repo, _) = three_commit_repo("obtain_reuse");
    let base = TempTestDir::new("obtain_reuse_base");

    for backend in backends() {
        let mut handle = obtain_local(backend.as_ref(), &repo, &base);
        assert!(!handle.created());
        assert_eq!(handle.path(), repo.path());
        assert_eq!(
            handle.original_head(),
            Some(&HeadRef::Branch("main".to_string()))
        );

        handle.release().expect("release");
        assert!(repo.path().join(".git").exists(), "reused copy must survive release");
    }
}

#[test]
fn test_obtain_clones_and_release_deletes() {
    let (repo, [_, _, c3]) = three_commit_repo("obtain_clone");
    let base = TempTestDir::new("obtain_clone_base");

    for backend in backends() {
        let target = base.path().join(format!("clone-{}", backend.name()));
        let manager = WorkingCopyManager::new(base.path());
        let reference = RepositoryReference::new(repo.file_url()).with_local_path(&target);

        let mut handle = manager.obtain(backend.as_ref(), &reference).expect("clone");
        assert!(handle.created());
        assert!(target.join("src/lib.rs").exists());
        assert_eq!(
            recent_commits(backend.as_ref(), &handle, "HEAD", 1)[0].hash,
            c3
        );

        handle.release().expect("release");
        assert!(!target.exists());
        handle.release().expect("release is idempotent");
    }
}

#[test]
fn test_obtain_clone_target_is_derived_from_name() {
    let (repo, _) = three_commit_repo("obtain_derived");
    let base = TempTestDir::new("obtain_derived_base");
    let backend = repolens_git::Git2Backend;
    let manager = WorkingCopyManager::new(base.path().join("repos"));
    let reference = RepositoryReference::new(repo.file_url());

    let expected = manager.target_for(&reference);
    assert_eq!(expected, base.path().join("repos").join(reference.dir_name()));

    let handle = manager.obtain(&backend, &reference).expect("clone");
    assert!(handle.created());
    assert_eq!(handle.path(), expected.as_path());
    drop(handle);
    assert!(!expected.exists(), "dropping the handle removes the clone");
}

#[test]
fn test_kept_clone_survives_and_can_be_reused() {
    let (repo, _) = three_commit_repo("obtain_keep");
    let base = TempTestDir::new("obtain_keep_base");
    let backend = repolens_git::GitCliBackend::default();
    let manager = WorkingCopyManager::new(base.path());
    let reference = RepositoryReference::new(repo.file_url());

    let handle = manager.obtain(&backend, &reference).expect("clone");
    let kept = handle.keep();
    assert!(kept.join(".git").exists());

    let mut reused = manager.obtain(&backend, &reference).expect("reuse");
    assert!(!reused.created());
    assert_eq!(reused.path(), kept.as_path());
    reused.release().expect("release");
    assert!(kept.exists(), "a reused copy is never deleted");
}

#[test]
fn test_obtain_local_directory_wins_over_cached_clone_with_same_name() {
    let (repo, [_, _, c3]) = three_commit_repo("obtain_collision");
    let other = TestGitRepo::new("obtain_collision_other");
    other.write_and_commit("other.txt", "unrelated\n", "Unrelated project");
    let base = TempTestDir::new("obtain_collision_base");

    for backend in backends() {
        let manager = WorkingCopyManager::new(base.path());
        let reference = RepositoryReference::new(repo.path().display().to_string());
        let cached = manager.target_for(&reference);
        if !cached.exists() {
            backend.clone_repo(&other.file_url(), &cached).expect("seed cache");
        }

        let handle = manager.obtain(backend.as_ref(), &reference).expect("obtain");
        assert_eq!(handle.path(), repo.path(), "backend {}", backend.name());
        assert!(!handle.created());
        assert_eq!(recent_commits(backend.as_ref(), &handle, "HEAD", 1)[0].hash, c3);
    }
}

#[test]
fn test_obtain_clones_from_bare_repository() {
    let (repo, [_, _, c3]) = three_commit_repo("obtain_bare");
    let base = TempTestDir::new("obtain_bare_base");
    let bare = base.path().join("project.git");
    repo.clone_bare(&bare);

    for backend in backends() {
        assert!(backend.is_bare_repository(&bare));
        assert!(!backend.is_repository(&bare));

        let manager = WorkingCopyManager::new(base.path().join(format!("work-{}", backend.name())));
        let reference = RepositoryReference::new(bare.display().to_string());
        let mut handle = manager.obtain(backend.as_ref(), &reference).expect("clone from bare");
        assert!(handle.created());
        assert_eq!(handle.path(), manager.target_for(&reference).as_path());
        assert_eq!(recent_commits(backend.as_ref(), &handle, "HEAD", 1)[0].hash, c3);

        handle.release().expect("release");
        assert!(bare.join("HEAD").exists(), "the bare source must survive");
    }
}

#[test]
fn test_obtain_rejects_plain_local_directory() {
    let base = TempTestDir::new("obtain_plain");
    let plain = base.path().join("plain");
    std::fs::create_dir_all(&plain).expect("mkdir");

    for backend in backends() {
        assert!(!backend.is_bare_repository(&plain));
        let manager = WorkingCopyManager::new(base.path().join("work"));
        let reference = RepositoryReference::new(plain.display().to_string());
        let result = manager.obtain(backend.as_ref(), &reference);
        assert!(matches!(result, Err(GitError::Acquisition { .. })));
    }
}

#[test]
fn test_obtain_unreachable_url_leaves_nothing_behind() {
    let base = TempTestDir::new("obtain_unreachable");

    for backend in backends() {
        let manager = WorkingCopyManager::new(base.path());
        let reference = RepositoryReference::new("file:///nonexistent/repolens/missing.git");
        let target = manager.target_for(&reference);

        let result = manager.obtain(backend.as_ref(), &reference);
        match result {
            Err(e) => assert!(e.is_acquisition(), "unexpected error: {e}"),
            Ok(_) => panic!("clone of a missing repository should fail"),
        }
        assert!(!target.exists(), "partial clone must be removed");
    }
}

#[test]
fn test_obtain_rejects_non_repository_target() {
    let base = TempTestDir::new("obtain_non_repo");
    let occupied = base.path().join("occupied");
    std::fs::create_dir_all(&occupied).expect("mkdir");
    std::fs::write(occupied.join("notes.txt"), "keep me").expect("write");

    for backend in backends() {
        let manager = WorkingCopyManager::new(base.path());
        let reference =
            RepositoryReference::new("https://example.invalid/occupied.git").with_local_path(&occupied);
        let result = manager.obtain(backend.as_ref(), &reference);
        assert!(matches!(result, Err(GitError::Acquisition { .. })));
        assert!(occupied.join("notes.txt").exists(), "user files must survive");
    }
}

#[test]
fn test_obtain_same_path_twice_is_busy() {
    let (repo, _) = three_commit_repo("obtain_busy");
    let base = TempTestDir::new("obtain_busy_base");
    let backend = repolens_git::Git2Backend;

    let first = obtain_local(&backend, &repo, &base);
    let manager = WorkingCopyManager::new(base.path());
    let reference = RepositoryReference::new(repo.path().display().to_string());
    assert!(matches!(
        manager.obtain(&backend, &reference),
        Err(GitError::Busy { .. })
    ));
    drop(first);
    assert!(manager.obtain(&backend, &reference).is_ok());
}

#[test]
fn test_checkout_guard_restores_on_drop() {
    let (repo, [c1, _, c3]) = three_commit_repo("guard_drop");

    for backend in backends() {
        {
            let _guard = CheckoutGuard::checkout(backend.as_ref(), repo.path(), &c1).expect("checkout");
            assert_eq!(repo.head_sha(), c1);
            assert!(repo.path().join("README.md").exists());
        }
        assert_eq!(repo.current_branch().as_deref(), Some("main"));
        assert_eq!(repo.head_sha(), c3);
        assert!(!repo.path().join("README.md").exists());
    }
}
