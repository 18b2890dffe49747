//! Integration tests for multi-reference transactions.

use std::path::Path;
use std::process::Command;
use std::thread;

use tempfile::TempDir;

use gitbridge::core::Error;
use gitbridge::git::Git;
use gitbridge::txn::{Transaction, TransactionState};
use gitbridge::Oid;

/// Test fixture with two commits and branches `a` and `b` on the first.
struct TestRepo {
    dir: TempDir,
    first: Oid,
    second: Oid,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);
        run_git(dir.path(), &["branch", "a"]);
        run_git(dir.path(), &["branch", "b"]);
        let first = Git::open(dir.path()).unwrap().head_oid().unwrap();

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n\nmore\n").unwrap();
        run_git(dir.path(), &["commit", "-am", "Second commit"]);
        let second = Git::open(dir.path()).unwrap().head_oid().unwrap();

        Self { dir, first, second }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    fn target(&self, refname: &str) -> Option<Oid> {
        self.git().reference_target(refname).unwrap()
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

mod locking {
    use super::*;

    #[test]
    fn second_lock_on_same_ref_fails_fast() {
        let repo = TestRepo::new();
        let mut first = Transaction::open(repo.path()).unwrap();
        let mut second = Transaction::open(repo.path()).unwrap();

        first.lock_ref("refs/heads/a").unwrap();
        let err = second.lock_ref("refs/heads/a").unwrap_err();
        assert!(
            matches!(&err, Error::LockConflict { refname } if refname == "refs/heads/a"),
            "got {err:?}"
        );

        // Released once the holder finishes.
        first.rollback().unwrap();
        second.lock_ref("refs/heads/a").unwrap();
    }

    #[test]
    fn disjoint_refs_commit_from_separate_threads() {
        let repo = TestRepo::new();
        let path = repo.path().to_path_buf();
        let second = repo.second;

        let workers: Vec<_> = ["refs/heads/a", "refs/heads/b"]
            .into_iter()
            .map(|refname| {
                let path = path.clone();
                thread::spawn(move || {
                    Transaction::scope(&path, |txn| {
                        txn.lock_ref(refname)?;
                        txn.set_target(refname, second, None, Some("move"))
                    })
                })
            })
            .collect();
        for worker in workers {
            let result: Result<(), Error> = worker.join().unwrap();
            result.unwrap();
        }

        assert_eq!(repo.target("refs/heads/a"), Some(repo.second));
        assert_eq!(repo.target("refs/heads/b"), Some(repo.second));
    }

    #[test]
    fn mutating_an_unlocked_ref_is_rejected() {
        let repo = TestRepo::new();
        let mut txn = Transaction::open(repo.path()).unwrap();
        let err = txn
            .set_target("refs/heads/a", repo.second, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::RefNotLocked { .. }), "got {err:?}");
    }

    #[test]
    fn malformed_name_is_invalid_spec() {
        let repo = TestRepo::new();
        let mut txn = Transaction::open(repo.path()).unwrap();
        let err = txn.lock_ref("refs/heads/bad..name").unwrap_err();
        assert_eq!(
            err.native_kind(),
            Some(gitbridge::core::NativeErrorKind::InvalidSpec)
        );
    }
}

mod commit {
    use super::*;

    #[test]
    fn updates_apply_together() {
        let repo = TestRepo::new();
        let mut txn = Transaction::open(repo.path()).unwrap();
        txn.lock_ref("refs/heads/a").unwrap();
        txn.lock_ref("refs/heads/b").unwrap();
        txn.lock_ref("refs/heads/alias").unwrap();
        txn.set_target("refs/heads/a", repo.second, None, None)
            .unwrap();
        txn.remove("refs/heads/b").unwrap();
        txn.set_symbolic_target("refs/heads/alias", "refs/heads/a", None, None)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(repo.target("refs/heads/a"), Some(repo.second));
        assert_eq!(repo.target("refs/heads/b"), None);
        assert_eq!(
            repo.git().symbolic_target("refs/heads/alias").unwrap().as_deref(),
            Some("refs/heads/a")
        );
    }

    #[test]
    fn external_change_fails_whole_commit() {
        let repo = TestRepo::new();
        let mut txn = Transaction::open(repo.path()).unwrap();
        txn.lock_ref("refs/heads/a").unwrap();
        txn.lock_ref("refs/heads/b").unwrap();
        txn.set_target("refs/heads/a", repo.second, None, None)
            .unwrap();
        txn.set_target("refs/heads/b", repo.second, None, None)
            .unwrap();

        // Someone outside the process moves `b`.
        run_git(
            repo.path(),
            &["update-ref", "refs/heads/b", &repo.second.to_string()],
        );

        let err = txn.commit().unwrap_err();
        assert!(
            matches!(&err, Error::RefChanged { refname } if refname == "refs/heads/b"),
            "got {err:?}"
        );
        assert_eq!(txn.state(), TransactionState::Failed);
        assert_eq!(repo.target("refs/heads/a"), Some(repo.first));
        assert_eq!(repo.target("refs/heads/b"), Some(repo.second));
    }

    #[test]
    fn commit_twice_is_closed() {
        let repo = TestRepo::new();
        let mut txn = Transaction::open(repo.path()).unwrap();
        txn.commit().unwrap();
        assert!(matches!(txn.commit(), Err(Error::TransactionClosed)));
        assert!(matches!(
            txn.lock_ref("refs/heads/a"),
            Err(Error::TransactionClosed)
        ));
    }

    #[test]
    fn rollback_leaves_refs_alone() {
        let repo = TestRepo::new();
        let mut txn = Transaction::open(repo.path()).unwrap();
        txn.lock_ref("refs/heads/a").unwrap();
        txn.set_target("refs/heads/a", repo.second, None, None)
            .unwrap();
        txn.rollback().unwrap();
        txn.rollback().unwrap();

        assert_eq!(txn.state(), TransactionState::RolledBack);
        assert_eq!(repo.target("refs/heads/a"), Some(repo.first));
    }

    #[test]
    fn reflog_records_the_message() {
        let repo = TestRepo::new();
        repo.git()
            .transaction()
            .unwrap()
            .with_reflog_message("bulk move")
            .run(|txn| {
                txn.lock_ref("refs/heads/a")?;
                txn.set_target("refs/heads/a", repo.second, None, None)
            })
            .unwrap();

        let git2_repo = git2::Repository::open(repo.path()).unwrap();
        let reflog = git2_repo.reflog("refs/heads/a").unwrap();
        let latest = reflog.get(0).unwrap();
        assert_eq!(latest.message(), Some("bulk move"));
        assert_eq!(latest.id_new(), repo.second);
    }
}

mod scope {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum ScopeError {
        #[error("caller gave up")]
        GaveUp,
        #[error(transparent)]
        Bridge(#[from] Error),
    }

    #[test]
    fn ok_commits() {
        let repo = TestRepo::new();
        let value = Transaction::scope(repo.path(), |txn| -> Result<u32, ScopeError> {
            txn.lock_ref("refs/heads/a")?;
            txn.set_target("refs/heads/a", repo.second, None, None)?;
            Ok(7)
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(repo.target("refs/heads/a"), Some(repo.second));
    }

    #[test]
    fn err_rolls_back_and_keeps_the_error() {
        let repo = TestRepo::new();
        let err = Transaction::scope(repo.path(), |txn| -> Result<(), ScopeError> {
            txn.lock_ref("refs/heads/a")?;
            txn.set_target("refs/heads/a", repo.second, None, None)?;
            Err(ScopeError::GaveUp)
        })
        .unwrap_err();

        assert!(matches!(err, ScopeError::GaveUp));
        assert_eq!(repo.target("refs/heads/a"), Some(repo.first));
        assert!(!gitbridge::txn::is_locked(
            &repo.path().join(".git").canonicalize().unwrap(),
            "refs/heads/a"
        ));
    }
}

mod affinity {
    use super::*;

    #[test]
    fn every_operation_checks_the_owning_thread() {
        let repo = TestRepo::new();
        let second = repo.second;
        let mut txn = Transaction::open(repo.path()).unwrap();
        txn.lock_ref("refs/heads/a").unwrap();

        let mut txn = thread::spawn(move || {
            let affinity = |result: Result<(), Error>| {
                assert!(
                    matches!(result, Err(Error::ThreadAffinity { .. })),
                    "got {result:?}"
                );
            };
            affinity(txn.lock_ref("refs/heads/b"));
            affinity(txn.set_target("refs/heads/a", second, None, None));
            affinity(txn.set_symbolic_target("refs/heads/a", "refs/heads/b", None, None));
            affinity(txn.remove("refs/heads/a"));
            affinity(txn.commit());
            affinity(txn.rollback());
            assert_eq!(txn.state(), TransactionState::Open);
            txn
        })
        .join()
        .unwrap();

        // Still usable from the thread that opened it.
        txn.set_target("refs/heads/a", second, None, None).unwrap();
        txn.commit().unwrap();
        assert_eq!(repo.target("refs/heads/a"), Some(second));
    }
}
