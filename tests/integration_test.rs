//! Integration tests for git-identity
//!
//! These tests run the real `git` binary and are skipped when it is not
//! installed. Every test works in its own temporary repository and only
//! touches local config.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use git_identity::config::AssignmentState;
use git_identity::git::{ConfigScope, MemorySink, locate};
use git_identity::{
    Error, ExecOptions, Git, GitErrorKind, Identity, IdentityGuard, IdentityStatus,
};

/// Helper to run git directly, outside the code under test
async fn git_cmd(repo_path: &Path, args: &[&str]) {
    let output = tokio::process::Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .await
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Helper to create a test git repository with one commit
async fn create_test_repo() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let repo_path = temp_dir.path().join("repo");
    tokio::fs::create_dir_all(&repo_path).await.unwrap();

    git_cmd(&repo_path, &["init"]).await;

    // Configure git user for commits
    git_cmd(&repo_path, &["config", "user.email", "test@test.com"]).await;
    git_cmd(&repo_path, &["config", "user.name", "Test User"]).await;
    git_cmd(&repo_path, &["config", "commit.gpgsign", "false"]).await;

    // Create initial commit
    tokio::fs::write(repo_path.join("README.md"), "# Test Repository\n")
        .await
        .unwrap();
    tokio::fs::write(repo_path.join("lib.rs"), "pub fn answer() -> u32 { 42 }\n")
        .await
        .unwrap();

    git_cmd(&repo_path, &["add", "README.md", "lib.rs"]).await;
    git_cmd(&repo_path, &["commit", "-m", "Initial commit"]).await;

    (temp_dir, repo_path)
}

/// Helper to check if git is available
async fn git_available() -> bool {
    tokio::process::Command::new("git")
        .arg("--version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

async fn git() -> Git {
    Git::new(locate(None).await.expect("git is installed"))
}

#[tokio::test]
async fn test_locate_finds_git() {
    if !git_available().await {
        eprintln!("Skipping test: git not available");
        return;
    }

    let binary = locate(None).await.unwrap();
    assert!(!binary.version.is_empty());
    assert!(!binary.version.starts_with("git version"));
    assert!(binary.version.chars().next().unwrap().is_ascii_digit());
}

#[tokio::test]
async fn test_exec_feeds_input() {
    if !git_available().await {
        eprintln!("Skipping test: git not available");
        return;
    }

    let (_temp_dir, repo_path) = create_test_repo().await;
    let git = git().await;

    let result = git
        .exec(
            &repo_path,
            &["hash-object", "--stdin"],
            ExecOptions::new().with_input("hello\n"),
        )
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "ce013625030ba8dba906f756967f9e9ca394464a\n");
}

#[tokio::test]
async fn test_config_round_trip() {
    if !git_available().await {
        eprintln!("Skipping test: git not available");
        return;
    }

    let (_temp_dir, repo_path) = create_test_repo().await;
    let repo = git().await.open(&repo_path);
    let local = Some(ConfigScope::Local);

    assert_eq!(repo.config_get(local, "user.name").await.unwrap(), "Test User");
    assert_eq!(repo.config_get_opt(local, "identity.test").await.unwrap(), None);

    repo.config_set(local, "identity.test", "some value").await.unwrap();
    assert_eq!(
        repo.config_get_opt(local, "identity.test").await.unwrap(),
        Some("some value".to_string())
    );

    repo.config_unset(local, "identity.test").await.unwrap();
    assert_eq!(repo.config_get_opt(local, "identity.test").await.unwrap(), None);

    // Unsetting again is fine
    repo.config_unset(local, "identity.test").await.unwrap();
}

#[tokio::test]
async fn test_status_reports_changes() {
    if !git_available().await {
        eprintln!("Skipping test: git not available");
        return;
    }

    let (_temp_dir, repo_path) = create_test_repo().await;
    let repo = git().await.open(&repo_path);

    assert!(repo.status().await.unwrap().is_empty());

    git_cmd(&repo_path, &["mv", "README.md", "DOCS.md"]).await;
    tokio::fs::write(repo_path.join("lib.rs"), "pub fn answer() -> u32 { 43 }\n")
        .await
        .unwrap();
    tokio::fs::write(repo_path.join("notes with spaces.txt"), "todo\n")
        .await
        .unwrap();
    tokio::fs::create_dir_all(repo_path.join("drafts")).await.unwrap();
    tokio::fs::write(repo_path.join("drafts").join("one.md"), "draft\n")
        .await
        .unwrap();

    let entries = repo.status().await.unwrap();
    assert_eq!(entries.len(), 4, "unexpected entries: {:?}", entries);

    let find = |path: &str| entries.iter().find(|e| e.path == path).cloned();

    let renamed = find("README.md").expect("rename entry");
    assert_eq!(renamed.code(), "R ");
    assert_eq!(renamed.rename.as_deref(), Some("DOCS.md"));

    assert_eq!(find("lib.rs").expect("modified entry").code(), " M");
    assert!(find("notes with spaces.txt").expect("untracked").is_untracked());
    assert!(find("drafts/one.md").expect("untracked in dir").is_untracked());
}

#[tokio::test]
async fn test_not_a_repository_is_classified() {
    if !git_available().await {
        eprintln!("Skipping test: git not available");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let outside = temp_dir.path().join("plain");
    tokio::fs::create_dir_all(&outside).await.unwrap();

    let sink = MemorySink::new();
    let repo = git()
        .await
        .with_sink(Arc::new(sink.clone()))
        .open(&outside)
        .with_env("GIT_CEILING_DIRECTORIES", temp_dir.path().to_string_lossy());

    let err = repo.status().await.unwrap_err();
    assert_eq!(err.git_kind(), Some(GitErrorKind::NotAGitRepository));

    let err = repo
        .run(&["rev-parse", "--show-toplevel"], ExecOptions::new())
        .await
        .unwrap_err();
    match err {
        Error::Git(e) => {
            assert_eq!(e.kind(), Some(GitErrorKind::NotAGitRepository));
        }
        other => panic!("expected a git error, got {:?}", other),
    }

    // Failed runs surface stderr through the sink
    assert!(
        sink.lines()
            .iter()
            .any(|line| line.to_lowercase().contains("not a git repository"))
    );
}

#[tokio::test]
async fn test_identity_apply_and_check() {
    if !git_available().await {
        eprintln!("Skipping test: git not available");
        return;
    }

    let (temp_dir, repo_path) = create_test_repo().await;
    let repo = git().await.open(&repo_path);

    let guard = IdentityGuard::new(vec![
        Identity::new("work", "Jane Doe", "jane@corp.example").with_remote("example.com/corp/"),
        Identity::new("personal", "Jane", "jane@home.example"),
    ])
    .unwrap();

    // The repository starts with an identity nobody configured
    assert!(matches!(
        guard.check(&repo).await.unwrap(),
        IdentityStatus::Unknown { .. }
    ));

    git_cmd(
        &repo_path,
        &["remote", "add", "origin", "https://example.com/corp/api.git"],
    )
    .await;

    guard
        .apply(&repo, "personal", Some(ConfigScope::Local))
        .await
        .unwrap();
    assert_eq!(
        guard.check(&repo).await.unwrap(),
        IdentityStatus::Mismatch {
            current: guard.current(&repo).await.unwrap(),
            expected: "work".to_string(),
        }
    );

    guard
        .apply(&repo, "work", Some(ConfigScope::Local))
        .await
        .unwrap();
    assert_eq!(
        guard.check(&repo).await.unwrap(),
        IdentityStatus::Matched {
            label: "work".to_string()
        }
    );

    // Remember the assignment against the repository root
    let root = repo.root().await.unwrap();
    assert_eq!(
        std::fs::canonicalize(&root).unwrap(),
        std::fs::canonicalize(&repo_path).unwrap()
    );

    let state_path = temp_dir.path().join("assignments.json");
    let mut state = AssignmentState::load_from(&state_path).unwrap();
    state.record(root.clone(), "work");
    state.save().unwrap();

    let reloaded = AssignmentState::load_from(&state_path).unwrap();
    assert_eq!(reloaded.get(&root).unwrap().identity, "work");
}
