//! Shared test helpers for simver integration tests.
//!
//! All tests use temp directories; no side effects on the real repo. A test
//! usually builds a bare `origin` with [`setup_origin`] and then works in one
//! or more clones of it, like concurrent CI runners would.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use simver::{GitTagStore, PrDetails};
use simver_git::GixRepo;
use tempfile::TempDir;

/// Run git with a fixed identity and return trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args([
            "-c",
            "user.name=Test User",
            "-c",
            "user.email=test@test.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_owned()
}

/// Make an empty commit and return its id.
pub fn commit(dir: &Path, message: &str) -> String {
    git(dir, &["commit", "--quiet", "--allow-empty", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// A bare origin whose `main` has one commit.
pub fn setup_origin() -> TempDir {
    let origin = TempDir::new().expect("failed to create temp dir");
    git(origin.path(), &["init", "--quiet", "--bare"]);
    git(origin.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let seed = TempDir::new().expect("failed to create temp dir");
    git(seed.path(), &["init", "--quiet"]);
    git(seed.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
    commit(seed.path(), "initial");
    git(
        seed.path(),
        &["remote", "add", "origin", origin.path().to_str().expect("utf-8 path")],
    );
    git(seed.path(), &["push", "--quiet", "origin", "main"]);
    origin
}

/// Clone `origin` into a fresh temp dir.
pub fn clone(origin: &Path) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    git(
        dir.path(),
        &["clone", "--quiet", origin.to_str().expect("utf-8 path"), "."],
    );
    dir
}

/// A writable tag store over a working copy, exchanging tags with `origin`.
pub fn store(dir: &Path) -> GitTagStore<GixRepo> {
    GitTagStore::new(GixRepo::open(dir).expect("failed to open repo"), "origin")
}

/// Tag names on the remote, sorted.
pub fn remote_tags(origin: &Path) -> Vec<String> {
    let mut tags: Vec<String> = git(origin, &["tag", "--list"])
        .lines()
        .map(str::to_owned)
        .collect();
    tags.sort();
    tags
}

/// The commit a tag on the remote points at (peeled).
pub fn remote_tag_target(origin: &Path, tag: &str) -> String {
    git(origin, &["rev-parse", &format!("{tag}^{{commit}}")])
}

/// Start `branch` from `main` in `dir`, commit once, and push it.
pub fn open_branch(dir: &Path, branch: &str) -> String {
    git(dir, &["checkout", "--quiet", "-b", branch, "origin/main"]);
    let head = commit(dir, &format!("work on {branch}"));
    git(dir, &["push", "--quiet", "origin", branch]);
    head
}

/// Another commit on the current branch, pushed.
pub fn push_commit(dir: &Path, branch: &str, message: &str) -> String {
    let head = commit(dir, message);
    git(dir, &["push", "--quiet", "origin", branch]);
    head
}

/// An open PR from `branch` into `main`, as the hosting platform reports it.
pub fn open_pr(dir: &Path, number: u64, branch: &str) -> PrDetails {
    let main = git(dir, &["rev-parse", "origin/main"]);
    PrDetails {
        number,
        head_branch: branch.to_owned(),
        base_branch: "main".to_owned(),
        root_branch: "main".to_owned(),
        head_commit: git(dir, &["rev-parse", &format!("origin/{branch}")]),
        base_commit: main.clone(),
        root_commit: main,
        ..PrDetails::default()
    }
}

/// Run the simver binary in `dir`.
pub fn simver_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_simver"))
        .args(args)
        .current_dir(dir)
        .env_remove("GITHUB_ACTIONS")
        .env_remove("GITHUB_OUTPUT")
        .env_remove("GITHUB_WORKSPACE")
        .env_remove("GITHUB_TOKEN")
        .env_remove("SIMVER_READ_ONLY")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run simver")
}
