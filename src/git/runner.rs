//! Git process runner
//!
//! Runs one git subcommand per call against a working directory:
//! - `exec` buffers stdout/stderr and classifies failures
//! - `stream` hands back the live child for incremental consumption
//!
//! Invocations are independent; nothing here queues or serializes them.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, instrument};

use super::{GitBinary, OutputSink, Repository, TracingSink};
use crate::error::{GitErrorKind, ProcessError};

/// Environment variable naming the subcommand a child process was started for
pub const COMMAND_MARKER_VAR: &str = "GIT_IDENTITY_GIT_COMMAND";

/// Locale forced on every git child so output stays parseable
pub const GIT_LOCALE: &str = "en_US.UTF-8";

/// Stderr patterns, checked in order; the first match wins
static ERROR_PATTERNS: LazyLock<Vec<(Regex, GitErrorKind)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)Authentication failed").unwrap(),
            GitErrorKind::AuthenticationFailed,
        ),
        (
            Regex::new(r"(?i)Not a git repository").unwrap(),
            GitErrorKind::NotAGitRepository,
        ),
        (
            Regex::new(r"bad config file").unwrap(),
            GitErrorKind::BadConfigFile,
        ),
        (
            Regex::new(
                r"cannot make pipe for command substitution|cannot create standard input pipe",
            )
            .unwrap(),
            GitErrorKind::CantCreatePipe,
        ),
        (
            Regex::new(r"Repository not found").unwrap(),
            GitErrorKind::RepositoryNotFound,
        ),
        (
            Regex::new(r"unable to access").unwrap(),
            GitErrorKind::CantAccessRemote,
        ),
    ]
});

/// Classify a failed invocation from its stderr
pub fn classify(stderr: &str) -> Option<GitErrorKind> {
    ERROR_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(stderr))
        .map(|(_, kind)| *kind)
}

/// Options for a single invocation
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Written to the child's stdin, which is then closed.
    /// Without input, stdin is the null device.
    pub input: Option<Vec<u8>>,
    /// Merged over the inherited environment; wins over the fixed variables
    pub env: HashMap<String, String>,
    /// Keep the command line and its stderr out of the output sink
    pub suppress_logging: bool,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn quiet(mut self) -> Self {
        self.suppress_logging = true;
        self
    }
}

/// Output of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Always 0; failures become [`ProcessError`]
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessError {
    /// Build the error for a process that ran and exited unsuccessfully
    pub fn from_exit(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            kind: classify(&stderr),
            stdout,
            stderr,
            source: None,
        }
    }

    /// Build the error for a process that could not be run or read
    pub fn from_io(command: impl Into<String>, source: io::Error) -> Self {
        let stderr = source.to_string();
        Self {
            command: command.into(),
            exit_code: None,
            stdout: String::new(),
            kind: classify(&stderr),
            stderr,
            source: Some(source),
        }
    }
}

/// Handle on a located git binary
///
/// Cheap to clone; every clone shares the same output sink.
#[derive(Clone)]
pub struct Git {
    binary: GitBinary,
    sink: Arc<dyn OutputSink>,
}

impl fmt::Debug for Git {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Git").field("binary", &self.binary).finish()
    }
}

impl Git {
    /// Create a handle that reports activity through `tracing`
    pub fn new(binary: GitBinary) -> Self {
        Self {
            binary,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the output sink
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn binary(&self) -> &GitBinary {
        &self.binary
    }

    pub fn path(&self) -> &Path {
        &self.binary.path
    }

    pub fn version(&self) -> &str {
        &self.binary.version
    }

    /// Bind a repository handle to `path`
    pub fn open(&self, path: impl Into<PathBuf>) -> Repository {
        Repository::new(self.clone(), path)
    }

    /// Run a git subcommand to completion and capture its output
    #[instrument(skip(self, options), fields(cwd = %cwd.display()))]
    pub async fn exec(
        &self,
        cwd: &Path,
        args: &[&str],
        mut options: ExecOptions,
    ) -> std::result::Result<ExecResult, ProcessError> {
        let command = subcommand(args);
        self.log_command(args, &options);

        let mut child = match self.command(cwd, args, &options).spawn() {
            Ok(child) => child,
            Err(e) => return Err(self.failed(ProcessError::from_io(command, e), &options)),
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Settles once the child has exited and both pipes are drained
        let joined = tokio::try_join!(
            child.wait(),
            feed(stdin, options.input.take()),
            drain(stdout),
            drain(stderr),
        );

        let (status, (), stdout, stderr) = match joined {
            Ok(parts) => parts,
            Err(e) => return Err(self.failed(ProcessError::from_io(command, e), &options)),
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if status.success() {
            return Ok(ExecResult {
                exit_code: 0,
                stdout,
                stderr,
            });
        }

        debug!("git {} exited with {}", command, status);
        Err(self.failed(
            ProcessError::from_exit(command, status.code(), stdout, stderr),
            &options,
        ))
    }

    /// Spawn a git subcommand and return the running child.
    ///
    /// stdout and stderr are piped and left unread. Failures after spawn are
    /// not classified; the caller decides what a bad exit means.
    #[instrument(skip(self, options), fields(cwd = %cwd.display()))]
    pub fn stream(
        &self,
        cwd: &Path,
        args: &[&str],
        options: ExecOptions,
    ) -> std::result::Result<Child, ProcessError> {
        let command = subcommand(args);
        self.log_command(args, &options);

        let mut child = match self.command(cwd, args, &options).spawn() {
            Ok(child) => child,
            Err(e) => return Err(self.failed(ProcessError::from_io(command, e), &options)),
        };

        if let Some(input) = options.input {
            let stdin = child.stdin.take();
            tokio::spawn(async move {
                if let Err(e) = feed(stdin, Some(input)).await {
                    debug!("Failed to write git {} input: {}", command, e);
                }
            });
        }

        Ok(child)
    }

    fn command(&self, cwd: &Path, args: &[&str], options: &ExecOptions) -> Command {
        let stdin = if options.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut cmd = Command::new(&self.binary.path);
        cmd.args(args)
            .current_dir(cwd)
            .env(COMMAND_MARKER_VAR, subcommand(args))
            .env("LC_ALL", GIT_LOCALE)
            .envs(&options.env)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn log_command(&self, args: &[&str], options: &ExecOptions) {
        if !options.suppress_logging {
            self.sink.emit(&format!("> git {}", args.join(" ")));
        }
    }

    /// Report a failure to the sink unless `options` silence it
    pub(super) fn failed(&self, err: ProcessError, options: &ExecOptions) -> ProcessError {
        if !options.suppress_logging && !err.stderr.is_empty() {
            self.sink.emit(&err.stderr);
        }
        err
    }
}

fn subcommand(args: &[&str]) -> String {
    args.first().copied().unwrap_or_default().to_string()
}

async fn feed(stdin: Option<ChildStdin>, input: Option<Vec<u8>>) -> io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };

    match stdin.write_all(&input).await {
        // The child may exit without reading; its exit status decides
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(e),
        Ok(()) => Ok(()),
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
