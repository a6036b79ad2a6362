//! Git integration through the `git` command line
//!
//! - `Locator` - Finds a usable git binary across platforms
//! - `Git` - Runs subcommands and classifies their failures
//! - `Repository` - Working-directory handle for config and status
//! - `parse_status` - Decoder for `git status -z`

mod locate;
mod output;
mod repository;
mod runner;
mod status;

#[cfg(all(test, unix))]
pub(crate) mod testing;

pub use locate::*;
pub use output::*;
pub use repository::*;
pub use runner::*;
pub use status::*;
