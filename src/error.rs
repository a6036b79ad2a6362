//! Error types for git-identity
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `Display` and `Error` impls.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for git-identity
#[derive(Error, Debug)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for Error {
    fn from(e: ProcessError) -> Self {
        Error::Git(GitError::Process(e))
    }
}

impl Error {
    /// The classified git failure kind, if this error came from git.
    pub fn git_kind(&self) -> Option<GitErrorKind> {
        match self {
            Error::Git(e) => e.kind(),
            _ => None,
        }
    }
}

/// Closed set of classified git failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitErrorKind {
    AuthenticationFailed,
    NotAGitRepository,
    BadConfigFile,
    CantCreatePipe,
    RepositoryNotFound,
    CantAccessRemote,
    /// Raised by the binary locator only, never by the process runner.
    GitNotFound,
}

impl fmt::Display for GitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GitErrorKind::AuthenticationFailed => "authentication failed",
            GitErrorKind::NotAGitRepository => "not a git repository",
            GitErrorKind::BadConfigFile => "bad config file",
            GitErrorKind::CantCreatePipe => "can't create pipe",
            GitErrorKind::RepositoryNotFound => "repository not found",
            GitErrorKind::CantAccessRemote => "can't access remote",
            GitErrorKind::GitNotFound => "git not found",
        };
        f.write_str(s)
    }
}

/// Git binary and invocation errors
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git is not installed or could not be found")]
    NotFound,

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl GitError {
    pub fn kind(&self) -> Option<GitErrorKind> {
        match self {
            GitError::NotFound => Some(GitErrorKind::GitNotFound),
            GitError::Process(e) => e.kind,
        }
    }
}

/// A failed git invocation
///
/// Produced on a non-zero exit or when the process could not be run at all.
/// `exit_code` is `None` in the latter case and when the process was killed
/// by a signal.
#[derive(Error, Debug)]
#[error("git {command} failed{}{}", exit_suffix(.exit_code), stderr_suffix(.stderr))]
pub struct ProcessError {
    /// The git subcommand that failed (first argument)
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub kind: Option<GitErrorKind>,
    #[source]
    pub source: Option<std::io::Error>,
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Failed to create config directory: {0}")]
    DirectoryCreationFailed(PathBuf),
}

/// Identity profile errors
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Unknown identity: {0}")]
    Unknown(String),

    #[error("Duplicate identity label: {0}")]
    DuplicateLabel(String),

    #[error("Invalid identity '{label}': {reason}")]
    Invalid { label: String, reason: String },
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
