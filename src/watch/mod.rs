//! Background identity watching
//!
//! - `Scheduler` - One repeating task with start/stop
//! - `IdentityWatcher` - Re-checks a repository's identity on a schedule

mod scheduler;
mod watcher;

pub use scheduler::*;
pub use watcher::*;
