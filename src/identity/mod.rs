//! Per-repository commit identities
//!
//! - `Identity` - A configured name/email pair with optional remote rules
//! - `IdentityGuard` - Checks and applies identities through a `Repository`

mod guard;
mod types;

pub use guard::*;
pub use types::*;
