//! git-identity - Keep your commit identity correct in every repository
//!
//! This crate wraps the `git` command line to read and write a repository's
//! `user.name`/`user.email`, and checks them against a list of configured
//! identities so commits never go out under the wrong account.
//!
//! # Modules
//!
//! - [`git`] - Binary discovery, process runner, status parsing, repository handle
//! - [`identity`] - Identity profiles, checks and application
//! - [`watch`] - Scheduler and periodic identity watcher
//! - [`config`] - Configuration and assignment persistence
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod git;
pub mod identity;
pub mod watch;

pub use config::{AssignmentState, Config};
pub use error::{Error, GitErrorKind, ProcessError, Result};
pub use git::{ExecOptions, ExecResult, FileStatus, Git, GitBinary, Repository};
pub use identity::{Identity, IdentityGuard, IdentityStatus};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
