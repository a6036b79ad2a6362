//! Observable output for git invocations
//!
//! The runner reports every command line it executes, and the stderr of
//! failed commands, to an [`OutputSink`]. Sinks are called synchronously.

use std::sync::{Arc, Mutex};

use tracing::debug;

/// Receives one line of git activity at a time
pub trait OutputSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Forwards git activity to `tracing` at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn emit(&self, line: &str) {
        debug!(target: "git_identity::git", "{}", line.trim_end());
    }
}

/// Collects git activity in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line emitted so far
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.to_string());
    }
}
