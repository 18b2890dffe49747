//! End-to-end tests for the gitbridge binary.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Test fixture with `main`, a `feature` branch and CRLF attributes.
struct TestRepo {
    dir: TempDir,
    config_home: TempDir,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        std::fs::write(dir.path().join(".gitattributes"), "*.txt eol=crlf\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "a\nb\n").unwrap();
        run_git(dir.path(), &["add", "."]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);
        run_git(dir.path(), &["branch", "-M", "main"]);

        run_git(dir.path(), &["checkout", "-b", "feature"]);
        std::fs::write(dir.path().join("feature.txt"), "new\n").unwrap();
        run_git(dir.path(), &["add", "feature.txt"]);
        run_git(dir.path(), &["commit", "-m", "Feature"]);
        run_git(dir.path(), &["checkout", "main"]);

        Self {
            dir,
            config_home: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The binary, run inside this repository with an isolated config home.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("gitbridge").unwrap();
        cmd.current_dir(self.path())
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env_remove("GITBRIDGE_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--no-interactive");
        cmd
    }

    fn rev_parse(&self, rev: &str) -> Option<String> {
        let output = StdCommand::new("git")
            .args(["rev-parse", "--verify", "--quiet", rev])
            .current_dir(self.path())
            .output()
            .expect("git rev-parse failed");
        output
            .status
            .success()
            .then(|| String::from_utf8(output.stdout).unwrap().trim().to_string())
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
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

#[test]
fn help_lists_commands() {
    Command::cargo_bin("gitbridge")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update-refs"))
        .stdout(predicate::str::contains("cat-filtered"))
        .stdout(predicate::str::contains("stash-apply"));
}

#[test]
fn outside_a_repository_fails() {
    let empty = TempDir::new().unwrap();
    Command::cargo_bin("gitbridge")
        .unwrap()
        .current_dir(empty.path())
        .args(["--no-interactive", "checkout", "main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: Not a git repository"));
}

mod update_refs {
    use super::*;

    #[test]
    fn moves_and_deletes_together() {
        let repo = TestRepo::new();
        run_git(repo.path(), &["branch", "old"]);
        let feature = repo.rev_parse("feature").unwrap();

        repo.cmd()
            .args([
                "update-refs",
                "refs/heads/main=feature",
                "refs/heads/old=",
                "-m",
                "bulk",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Updated 2 reference(s)"));

        assert_eq!(repo.rev_parse("refs/heads/main"), Some(feature));
        assert_eq!(repo.rev_parse("refs/heads/old"), None);
    }

    #[test]
    fn bad_revision_changes_nothing() {
        let repo = TestRepo::new();
        let main = repo.rev_parse("main").unwrap();

        repo.cmd()
            .args([
                "update-refs",
                "refs/heads/main=feature",
                "refs/heads/other=no-such-rev",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no-such-rev"));

        assert_eq!(repo.rev_parse("refs/heads/main"), Some(main));
        assert_eq!(repo.rev_parse("refs/heads/other"), None);
    }

    #[test]
    fn malformed_update_is_rejected() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["update-refs", "refs/heads/main"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Expected REF=TARGET"));
    }
}

mod cat_filtered {
    use super::*;

    #[test]
    fn prints_crlf_content() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["cat-filtered", "HEAD", "--path", "notes.txt"])
            .assert()
            .success()
            .stdout("a\r\nb\r\n");
    }

    #[test]
    fn missing_path_fails() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["cat-filtered", "HEAD", "--path", "missing.txt"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No file 'missing.txt'"));
    }
}

mod checkout {
    use super::*;

    #[test]
    fn dry_run_lists_paths_and_keeps_head() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["checkout", "feature", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("feature.txt"));

        assert!(!repo.path().join("feature.txt").exists());
        assert_eq!(repo.rev_parse("HEAD"), repo.rev_parse("main"));
    }

    #[test]
    fn switches_branch() {
        let repo = TestRepo::new();
        repo.cmd()
            .args(["-q", "checkout", "feature"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        assert!(repo.path().join("feature.txt").exists());
        assert_eq!(repo.rev_parse("HEAD"), repo.rev_parse("feature"));
    }
}

mod fetch {
    use super::*;

    #[test]
    fn fetches_from_a_path() {
        let upstream = TestRepo::new();
        let local = TestRepo::new();
        let upstream_path = upstream.path().display().to_string();

        local
            .cmd()
            .args([
                "fetch",
                &upstream_path,
                "refs/heads/feature:refs/remotes/upstream/feature",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("refs/remotes/upstream/feature"));

        assert_eq!(
            local.rev_parse("refs/remotes/upstream/feature"),
            upstream.rev_parse("feature")
        );
    }
}
