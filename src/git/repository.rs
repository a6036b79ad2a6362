//! Repository handle
//!
//! Binds a working directory (and optional environment overrides) to a
//! [`Git`] handle. Owns no resources; every call spawns its own process.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

use super::{ExecOptions, FileStatus, Git, parse_status};
use crate::error::{ProcessError, Result};

/// `git config` scope flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Local,
    Global,
    System,
    Worktree,
}

impl ConfigScope {
    pub fn as_flag(&self) -> &'static str {
        match self {
            ConfigScope::Local => "--local",
            ConfigScope::Global => "--global",
            ConfigScope::System => "--system",
            ConfigScope::Worktree => "--worktree",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_flag()[2..])
    }
}

impl FromStr for ConfigScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ConfigScope::Local),
            "global" => Ok(ConfigScope::Global),
            "system" => Ok(ConfigScope::System),
            "worktree" => Ok(ConfigScope::Worktree),
            other => Err(format!("unknown config scope '{}'", other)),
        }
    }
}

/// A git working directory
#[derive(Debug, Clone)]
pub struct Repository {
    git: Git,
    path: PathBuf,
    env: HashMap<String, String>,
}

impl Repository {
    pub fn new(git: Git, path: impl Into<PathBuf>) -> Self {
        Self {
            git,
            path: path.into(),
            env: HashMap::new(),
        }
    }

    /// Add an environment override applied to every invocation
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Run an arbitrary subcommand in this repository
    pub async fn run(&self, args: &[&str], mut options: ExecOptions) -> Result<String> {
        let mut env = self.env.clone();
        env.extend(options.env);
        options.env = env;
        let result = self.git.exec(&self.path, args, options).await?;
        Ok(result.stdout)
    }

    /// Top-level directory of the working tree containing `path`
    pub async fn root(&self) -> Result<PathBuf> {
        let stdout = self
            .run(&["rev-parse", "--show-toplevel"], ExecOptions::new())
            .await?;
        Ok(PathBuf::from(trim_newline(&stdout)))
    }

    /// `git config [--<scope>] --get <key>`
    #[instrument(skip(self), fields(repo = %self.path.display()))]
    pub async fn config_get(&self, scope: Option<ConfigScope>, key: &str) -> Result<String> {
        let args = config_args(scope, &["--get", key]);
        let stdout = self.run(&args, ExecOptions::new()).await?;
        Ok(trim_newline(&stdout).to_string())
    }

    /// Like [`config_get`](Self::config_get), but an unset key is `None`
    pub async fn config_get_opt(
        &self,
        scope: Option<ConfigScope>,
        key: &str,
    ) -> Result<Option<String>> {
        let args = config_args(scope, &["--get", key]);
        match self.git.exec(&self.path, &args, self.options().quiet()).await {
            Ok(result) => Ok(Some(trim_newline(&result.stdout).to_string())),
            // git config exits 1 with no message when the key is missing
            Err(e) if is_unset_key(&e) => {
                debug!("{} is not set", key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `git config [--<scope>] <key> <value>`
    #[instrument(skip(self), fields(repo = %self.path.display()))]
    pub async fn config_set(
        &self,
        scope: Option<ConfigScope>,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let args = config_args(scope, &[key, value]);
        self.run(&args, ExecOptions::new()).await?;
        Ok(())
    }

    /// `git config [--<scope>] --unset <key>`
    pub async fn config_unset(&self, scope: Option<ConfigScope>, key: &str) -> Result<()> {
        let args = config_args(scope, &["--unset", key]);
        match self.git.exec(&self.path, &args, self.options()).await {
            Ok(_) => Ok(()),
            // Unsetting a key that is not set is not an error for us
            Err(e) if e.exit_code == Some(5) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// `git status -z -u`, including untracked files
    #[instrument(skip(self), fields(repo = %self.path.display()))]
    pub async fn status(&self) -> Result<Vec<FileStatus>> {
        const ARGS: [&str; 3] = ["status", "-z", "-u"];

        let options = self.options();
        let mut child = self.git.stream(&self.path, &ARGS, options.clone())?;
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let read_stdout = async {
            if let Some(pipe) = stdout_pipe.as_mut() {
                pipe.read_to_end(&mut stdout).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let read_stderr = async {
            if let Some(pipe) = stderr_pipe.as_mut() {
                pipe.read_to_end(&mut stderr).await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (status, (), ()) = tokio::try_join!(child.wait(), read_stdout, read_stderr)
            .map_err(|e| self.git.failed(ProcessError::from_io("status", e), &options))?;

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).into_owned();
            let err = ProcessError::from_exit("status", status.code(), stdout, stderr);
            return Err(self.git.failed(err, &options).into());
        }

        let entries = parse_status(&stdout);
        debug!("{} status entries", entries.len());
        Ok(entries)
    }

    fn options(&self) -> ExecOptions {
        ExecOptions::new().with_envs(self.env.clone())
    }
}

fn config_args<'a>(scope: Option<ConfigScope>, rest: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec!["config"];
    if let Some(scope) = scope {
        args.push(scope.as_flag());
    }
    args.extend_from_slice(rest);
    args
}

fn is_unset_key(e: &ProcessError) -> bool {
    e.exit_code == Some(1) && e.stderr.trim().is_empty()
}

fn trim_newline(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'])
}
