//! Identity model
//!
//! An identity is one `user.name`/`user.email` pair the user commits under,
//! optionally tied to the remotes it belongs to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A configured commit identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique key, e.g. "work" or "personal"
    pub label: String,
    /// Value for `user.name`
    pub name: String,
    /// Value for `user.email`
    pub email: String,
    /// Substrings of `remote.origin.url` this identity belongs to
    #[serde(default)]
    pub remotes: Vec<String>,
}

impl Identity {
    /// Create an identity with no remote rules
    pub fn new(label: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            email: email.into(),
            remotes: Vec::new(),
        }
    }

    /// Add a remote rule
    pub fn with_remote(mut self, pattern: impl Into<String>) -> Self {
        self.remotes.push(pattern.into());
        self
    }

    /// Whether this identity is the one currently in effect
    pub fn matches(&self, current: &CurrentIdentity) -> bool {
        let name_matches = current.name.as_deref() == Some(self.name.as_str());
        let email_matches = current
            .email
            .as_deref()
            .is_some_and(|email| email.eq_ignore_ascii_case(&self.email));
        name_matches && email_matches
    }

    /// Whether a remote URL belongs to this identity
    pub fn owns_remote(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.remotes
            .iter()
            .any(|pattern| !pattern.is_empty() && url.contains(&pattern.to_lowercase()))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// The identity git would use in a repository right now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurrentIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl fmt::Display for CurrentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("(unset)");
        let email = self.email.as_deref().unwrap_or("(unset)");
        write!(f, "{} <{}>", name, email)
    }
}

/// Outcome of checking a repository's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum IdentityStatus {
    /// No `user.email` in effect
    Missing,
    /// A configured identity is in effect and no remote rule disagrees
    Matched { label: String },
    /// The identity in effect is not a configured one
    Unknown { current: CurrentIdentity },
    /// The remote belongs to a different identity than the one in effect
    Mismatch {
        current: CurrentIdentity,
        expected: String,
    },
}

impl IdentityStatus {
    /// Whether committing now would use the wrong or no identity
    pub fn needs_attention(&self) -> bool {
        !matches!(self, Self::Matched { .. })
    }
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no identity configured"),
            Self::Matched { label } => write!(f, "using '{}'", label),
            Self::Unknown { current } => write!(f, "using unknown identity {}", current),
            Self::Mismatch { current, expected } => {
                write!(f, "using {} but remote belongs to '{}'", current, expected)
            }
        }
    }
}
