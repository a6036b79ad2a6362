//! Git binary discovery
//!
//! Finds a usable `git` executable on the host:
//! - An explicit hint is tried first
//! - Then a platform-specific fallback chain (macOS, Windows, generic)
//!
//! Every candidate must answer `git --version` before it is accepted.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::{GitError, Result};

/// Path the Xcode command line tools stub lives at on macOS
pub const XCODE_STUB_PATH: &str = "/usr/bin/git";

/// Label printed by `git --version` before the version number
const VERSION_LABEL: &str = "git version ";

/// A located git executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitBinary {
    /// Path to the executable (a bare name when resolved through `PATH`)
    pub path: PathBuf,
    /// Version reported by `git --version`, without the leading label
    pub version: String,
}

/// Discovery strategy family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

/// Git binary locator
///
/// Holds the platform to search for and a snapshot of the environment, which
/// is used both to look up well-known directories and as the environment of
/// every probe process.
#[derive(Debug, Clone)]
pub struct Locator {
    platform: Platform,
    env: HashMap<OsString, OsString>,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new()
    }
}

impl Locator {
    /// Locator for the host platform and the current process environment
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
            env: std::env::vars_os().collect(),
        }
    }

    /// Search as if running on `platform`
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Override an environment variable seen by the locator and its probes
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        let key = key.into();
        self.remove_var(&key);
        self.env.insert(key, value.into());
        self
    }

    /// Hide an environment variable from the locator and its probes
    pub fn without_env(mut self, key: impl AsRef<OsStr>) -> Self {
        self.remove_var(key.as_ref());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Find git, trying `hint` first and then the platform chain.
    ///
    /// A hint that fails its probe is not fatal: discovery falls through to
    /// the platform chain.
    #[instrument(skip(self), fields(platform = ?self.platform))]
    pub async fn locate(&self, hint: Option<&Path>) -> Result<GitBinary> {
        if let Some(hint) = hint {
            if let Some(git) = self.probe(hint).await {
                return Ok(git);
            }
            debug!("Hinted git {:?} is unusable, searching", hint);
        }

        let found = match self.platform {
            Platform::MacOs => self.find_git_darwin().await,
            Platform::Windows => self.find_git_windows().await,
            Platform::Other => self.probe(Path::new("git")).await,
        };

        match found {
            Some(git) => {
                info!("Using git {} from {:?}", git.version, git.path);
                Ok(git)
            }
            None => Err(GitError::NotFound.into()),
        }
    }

    async fn find_git_darwin(&self) -> Option<GitBinary> {
        let output = self.command("which").arg("git").output().await.ok()?;
        if !output.status.success() {
            return None;
        }

        let resolved = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if resolved.is_empty() {
            return None;
        }
        let path = PathBuf::from(resolved);

        // /usr/bin/git is a shim that only works once the developer tools exist
        if path == Path::new(XCODE_STUB_PATH) {
            let tools = self.command("xcode-select").arg("-p").output().await.ok()?;
            if !tools.status.success() {
                debug!("xcode-select -p failed, rejecting {}", XCODE_STUB_PATH);
                return None;
            }
        }

        self.probe(&path).await
    }

    async fn find_git_windows(&self) -> Option<GitBinary> {
        for var in ["ProgramW6432", "ProgramFiles(x86)", "ProgramFiles"] {
            let Some(base) = self.var(var) else {
                continue;
            };
            let candidate = base.join("Git").join("cmd").join("git.exe");
            if let Some(git) = self.probe(&candidate).await {
                return Some(git);
            }
        }

        if let Some(git) = self.probe(Path::new("git")).await {
            return Some(git);
        }

        self.find_github_portable_git().await
    }

    /// GitHub Desktop's old portable install: `%LOCALAPPDATA%\GitHub\PortableGit_*`
    async fn find_github_portable_git(&self) -> Option<GitBinary> {
        let github = self.var("LOCALAPPDATA")?.join("GitHub");
        let mut entries = tokio::fs::read_dir(&github).await.ok()?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with("PortableGit") {
                let candidate = entry.path().join("cmd").join("git.exe");
                return self.probe(&candidate).await;
            }
        }

        None
    }

    /// Run `<path> --version`, accepting the path only on a clean exit
    async fn probe(&self, path: &Path) -> Option<GitBinary> {
        let output = match self.command(path).arg("--version").output().await {
            Ok(output) => output,
            Err(e) => {
                debug!("Probe of {:?} failed to spawn: {}", path, e);
                return None;
            }
        };

        if !output.status.success() {
            debug!("Probe of {:?} exited with {}", path, output.status);
            return None;
        }

        let version = parse_version(&String::from_utf8_lossy(&output.stdout));
        debug!("Probe of {:?} found git {}", path, version);

        Some(GitBinary {
            path: path.to_path_buf(),
            version,
        })
    }

    fn command(&self, program: impl AsRef<OsStr>) -> Command {
        let mut cmd = Command::new(program);
        cmd.env_clear()
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn var(&self, key: &str) -> Option<PathBuf> {
        self.env
            .iter()
            .find(|(k, _)| self.key_matches(k, OsStr::new(key)))
            .map(|(_, v)| PathBuf::from(v))
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn remove_var(&mut self, key: &OsStr) {
        let platform = self.platform;
        self.env.retain(|k, _| !key_matches(platform, k, key));
    }

    fn key_matches(&self, a: &OsStr, b: &OsStr) -> bool {
        key_matches(self.platform, a, b)
    }
}

/// Windows environment names are case-insensitive
fn key_matches(platform: Platform, a: &OsStr, b: &OsStr) -> bool {
    match platform {
        Platform::Windows => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

/// Locate git for the host platform using the process environment
pub async fn locate(hint: Option<&Path>) -> Result<GitBinary> {
    Locator::new().locate(hint).await
}

/// Strip the `git version ` label from `git --version` output
pub fn parse_version(stdout: &str) -> String {
    let trimmed = stdout.trim();
    trimmed
        .strip_prefix(VERSION_LABEL)
        .unwrap_or(trimmed)
        .to_string()
}
