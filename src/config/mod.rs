//! Configuration and persistence module
//!
//! Handles:
//! - User configuration (`config.toml`: identities, git path, scope)
//! - Persistent assignments (`assignments.json`)

mod settings;
mod storage;

pub use settings::*;
pub use storage::*;
