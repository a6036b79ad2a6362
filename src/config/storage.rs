//! Persistent assignment storage
//!
//! Remembers which identity was applied to which repository, in JSON format

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, Result};

use super::Config;

/// One identity applied to one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Label of the applied identity
    pub identity: String,
    /// When it was applied
    pub assigned_at: DateTime<Utc>,
}

/// Persistent assignment state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentState {
    /// Repository root -> applied identity
    #[serde(default)]
    pub assignments: BTreeMap<PathBuf, Assignment>,

    /// Application version that last wrote this state
    #[serde(default)]
    pub version: String,

    /// Path to save state to (not serialized, set at load time)
    #[serde(skip)]
    state_path: Option<PathBuf>,
}

impl AssignmentState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }

    /// Load state from the default location
    pub fn load() -> Result<Self> {
        let path = Config::state_file_path()?;
        Self::load_from(&path)
    }

    /// Load state from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut state = Self::new();
            state.state_path = Some(path.to_path_buf());
            return Ok(state);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read state file: {}", e)))?;

        let mut state: AssignmentState = serde_json::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to parse state file: {}", e)))?;

        state.version = env!("CARGO_PKG_VERSION").to_string();
        state.state_path = Some(path.to_path_buf());

        Ok(state)
    }

    /// Load state from `path`, starting over if the file cannot be read.
    ///
    /// An unreadable file is moved aside to `<path>.bak` so the next save
    /// does not destroy it.
    pub fn load_or_reset(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(state) => state,
            Err(e) => {
                let backup = backup_path(path);
                warn!("{}; starting with empty assignments", e);
                match std::fs::rename(path, &backup) {
                    Ok(()) => warn!("Previous assignments kept at {:?}", backup),
                    Err(e) => warn!("Failed to move {:?} aside: {}", path, e),
                }

                let mut state = Self::new();
                state.state_path = Some(path.to_path_buf());
                state
            }
        }
    }

    /// [`load_or_reset`](Self::load_or_reset) at the default location
    pub fn load_or_reset_default() -> Result<Self> {
        Ok(Self::load_or_reset(&Config::state_file_path()?))
    }

    /// Save state to the remembered location (or default if none)
    pub fn save(&self) -> Result<()> {
        let path = match &self.state_path {
            Some(p) => p.clone(),
            None => Config::state_file_path()?,
        };
        self.save_to(&path)
    }

    /// Save state to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create state directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize state: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write state file: {}", e)))?;

        Ok(())
    }

    /// Record that `identity` was applied to `repo` just now
    pub fn record(&mut self, repo: impl Into<PathBuf>, identity: impl Into<String>) {
        self.assignments.insert(
            repo.into(),
            Assignment {
                identity: identity.into(),
                assigned_at: Utc::now(),
            },
        );
    }

    /// Get the assignment for a repository
    pub fn get(&self, repo: &Path) -> Option<&Assignment> {
        self.assignments.get(repo)
    }

    /// Forget a repository
    pub fn remove(&mut self, repo: &Path) -> Option<Assignment> {
        self.assignments.remove(repo)
    }

    /// Drop every assignment to an identity that no longer exists
    pub fn retain_identities<'a>(&mut self, labels: impl IntoIterator<Item = &'a str>) {
        let labels: Vec<&str> = labels.into_iter().collect();
        self.assignments
            .retain(|_, a| labels.contains(&a.identity.as_str()));
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}
