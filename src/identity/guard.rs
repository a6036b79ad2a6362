//! Identity checks and application
//!
//! Reads the identity git would use in a repository, compares it with the
//! configured identities, and writes a chosen identity back.

use std::collections::HashSet;

use tracing::{info, instrument};

use super::{CurrentIdentity, Identity, IdentityStatus};
use crate::error::{IdentityError, Result};
use crate::git::{ConfigScope, Repository};

const USER_NAME: &str = "user.name";
const USER_EMAIL: &str = "user.email";
const ORIGIN_URL: &str = "remote.origin.url";

/// Validated set of identities
#[derive(Debug, Clone)]
pub struct IdentityGuard {
    identities: Vec<Identity>,
}

impl IdentityGuard {
    /// Validate `identities`: unique labels, non-empty names, emails with `@`
    pub fn new(identities: Vec<Identity>) -> Result<Self> {
        let mut labels = HashSet::new();

        for identity in &identities {
            if identity.label.trim().is_empty() {
                return Err(IdentityError::Invalid {
                    label: identity.label.clone(),
                    reason: "label is empty".to_string(),
                }
                .into());
            }
            if !labels.insert(identity.label.as_str()) {
                return Err(IdentityError::DuplicateLabel(identity.label.clone()).into());
            }
            if identity.name.trim().is_empty() {
                return Err(IdentityError::Invalid {
                    label: identity.label.clone(),
                    reason: "name is empty".to_string(),
                }
                .into());
            }
            if !identity.email.contains('@') {
                return Err(IdentityError::Invalid {
                    label: identity.label.clone(),
                    reason: format!("'{}' is not an email address", identity.email),
                }
                .into());
            }
        }

        Ok(Self { identities })
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Look up an identity by label
    pub fn get(&self, label: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.label == label)
    }

    /// Read the effective `user.name` and `user.email`
    pub async fn current(&self, repo: &Repository) -> Result<CurrentIdentity> {
        let name = repo.config_get_opt(None, USER_NAME).await?;
        let email = repo.config_get_opt(None, USER_EMAIL).await?;
        Ok(CurrentIdentity { name, email })
    }

    /// The identity whose remote rules claim `origin`, if any
    pub async fn suggest(&self, repo: &Repository) -> Result<Option<&Identity>> {
        let Some(url) = repo.config_get_opt(None, ORIGIN_URL).await? else {
            return Ok(None);
        };
        Ok(self.suggest_for_remote(&url))
    }

    fn suggest_for_remote(&self, url: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.owns_remote(url))
    }

    /// Compare the identity in effect with the configured ones
    #[instrument(skip(self, repo), fields(repo = %repo.path().display()))]
    pub async fn check(&self, repo: &Repository) -> Result<IdentityStatus> {
        let current = self.current(repo).await?;
        let suggested = self.suggest(repo).await?;
        Ok(self.evaluate(current, suggested))
    }

    fn evaluate(&self, current: CurrentIdentity, suggested: Option<&Identity>) -> IdentityStatus {
        if current.email.is_none() {
            return IdentityStatus::Missing;
        }

        // Identities may share a name and email; prefer the one the remote asks for
        let matched = suggested
            .filter(|expected| expected.matches(&current))
            .or_else(|| self.identities.iter().find(|i| i.matches(&current)));

        match (suggested, matched) {
            (Some(expected), Some(actual)) if expected.label != actual.label => {
                IdentityStatus::Mismatch {
                    current,
                    expected: expected.label.clone(),
                }
            }
            (_, Some(actual)) => IdentityStatus::Matched {
                label: actual.label.clone(),
            },
            (Some(expected), None) => IdentityStatus::Mismatch {
                current,
                expected: expected.label.clone(),
            },
            (None, None) => IdentityStatus::Unknown { current },
        }
    }

    /// Write the identity labelled `label` into the repository's config.
    ///
    /// The two keys are written one after the other, never concurrently.
    #[instrument(skip(self, repo), fields(repo = %repo.path().display()))]
    pub async fn apply(
        &self,
        repo: &Repository,
        label: &str,
        scope: Option<ConfigScope>,
    ) -> Result<&Identity> {
        let identity = self
            .get(label)
            .ok_or_else(|| IdentityError::Unknown(label.to_string()))?;

        repo.config_set(scope, USER_NAME, &identity.name).await?;
        repo.config_set(scope, USER_EMAIL, &identity.email).await?;

        info!("Applied identity '{}' ({})", identity.label, identity);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn guard() -> IdentityGuard {
        IdentityGuard::new(vec![
            Identity::new("work", "Jane Doe", "jane@corp.example").with_remote("github.com/corp/"),
            Identity::new("personal", "Jane", "jane@home.example"),
        ])
        .unwrap()
    }

    fn current(name: &str, email: &str) -> CurrentIdentity {
        CurrentIdentity {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
        }
    }

    #[test]
    fn test_validation() {
        let dup = IdentityGuard::new(vec![
            Identity::new("a", "A", "a@x"),
            Identity::new("a", "B", "b@x"),
        ]);
        assert!(matches!(
            dup,
            Err(Error::Identity(IdentityError::DuplicateLabel(_)))
        ));

        let bad_email = IdentityGuard::new(vec![Identity::new("a", "A", "nope")]);
        assert!(matches!(
            bad_email,
            Err(Error::Identity(IdentityError::Invalid { .. }))
        ));

        let no_name = IdentityGuard::new(vec![Identity::new("a", " ", "a@x")]);
        assert!(no_name.is_err());

        assert!(IdentityGuard::new(Vec::new()).is_ok());
    }

    #[test]
    fn test_evaluate_missing() {
        let status = guard().evaluate(CurrentIdentity::default(), None);
        assert_eq!(status, IdentityStatus::Missing);
    }

    #[test]
    fn test_evaluate_matched_without_remote_rule() {
        let status = guard().evaluate(current("Jane", "jane@home.example"), None);
        assert_eq!(
            status,
            IdentityStatus::Matched {
                label: "personal".to_string()
            }
        );
    }

    #[test]
    fn test_evaluate_mismatch_against_remote_rule() {
        let g = guard();
        let suggested = g.suggest_for_remote("https://github.com/corp/api.git");

        let status = g.evaluate(current("Jane", "jane@home.example"), suggested);
        assert_eq!(
            status,
            IdentityStatus::Mismatch {
                current: current("Jane", "jane@home.example"),
                expected: "work".to_string(),
            }
        );

        let status = g.evaluate(current("Someone", "else@x.example"), suggested);
        assert!(matches!(status, IdentityStatus::Mismatch { .. }));

        let status = g.evaluate(current("Jane Doe", "jane@corp.example"), suggested);
        assert_eq!(
            status,
            IdentityStatus::Matched {
                label: "work".to_string()
            }
        );
    }

    #[test]
    fn test_evaluate_shared_email_prefers_suggested() {
        let g = IdentityGuard::new(vec![
            Identity::new("gh-work", "Jane Doe", "jane@corp.example").with_remote("github.com/corp/"),
            Identity::new("gl-work", "Jane Doe", "jane@corp.example").with_remote("gitlab.com/corp/"),
        ])
        .unwrap();
        let in_effect = current("Jane Doe", "jane@corp.example");

        let suggested = g.suggest_for_remote("https://gitlab.com/corp/api.git");
        assert_eq!(
            g.evaluate(in_effect.clone(), suggested),
            IdentityStatus::Matched {
                label: "gl-work".to_string()
            }
        );

        let suggested = g.suggest_for_remote("https://github.com/corp/api.git");
        assert_eq!(
            g.evaluate(in_effect.clone(), suggested),
            IdentityStatus::Matched {
                label: "gh-work".to_string()
            }
        );

        assert_eq!(
            g.evaluate(in_effect, None),
            IdentityStatus::Matched {
                label: "gh-work".to_string()
            }
        );
    }

    #[test]
    fn test_evaluate_unknown() {
        let status = guard().evaluate(current("Someone", "else@x.example"), None);
        assert!(matches!(status, IdentityStatus::Unknown { .. }));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::git::testing::fake_git;
        use tempfile::TempDir;

        /// Config values live in files named after their key
        const SCRIPT: &str = r#"
[ "$1" = "config" ] || exit 1
shift
[ "$1" = "--local" ] && shift
if [ "$1" = "--get" ]; then
  [ -f "$STORE/$2" ] || exit 1
  cat "$STORE/$2"
  exit 0
fi
printf '%s\n' "$2" > "$STORE/$1"
"#;

        fn setup() -> (TempDir, Repository) {
            let dir = TempDir::new().unwrap();
            let store = dir.path().join("store");
            std::fs::create_dir_all(&store).unwrap();
            let repo = fake_git(dir.path(), SCRIPT)
                .open(dir.path())
                .with_env("STORE", store.to_string_lossy());
            (dir, repo)
        }

        #[tokio::test]
        async fn test_check_before_and_after_apply() {
            let (dir, repo) = setup();
            let g = guard();

            assert_eq!(g.check(&repo).await.unwrap(), IdentityStatus::Missing);

            std::fs::write(
                dir.path().join("store").join(ORIGIN_URL),
                "git@github.com:corp/api.git\n",
            )
            .unwrap();
            let suggested = g.suggest(&repo).await.unwrap();
            assert!(suggested.is_none(), "ssh form is not covered by the rule");

            std::fs::write(
                dir.path().join("store").join(ORIGIN_URL),
                "https://github.com/corp/api.git\n",
            )
            .unwrap();
            assert_eq!(g.suggest(&repo).await.unwrap().unwrap().label, "work");

            g.apply(&repo, "personal", Some(ConfigScope::Local))
                .await
                .unwrap();
            assert!(matches!(
                g.check(&repo).await.unwrap(),
                IdentityStatus::Mismatch { .. }
            ));

            let applied = g.apply(&repo, "work", None).await.unwrap();
            assert_eq!(applied.email, "jane@corp.example");
            assert_eq!(
                g.current(&repo).await.unwrap(),
                current("Jane Doe", "jane@corp.example")
            );
            assert_eq!(
                g.check(&repo).await.unwrap(),
                IdentityStatus::Matched {
                    label: "work".to_string()
                }
            );
        }

        #[tokio::test]
        async fn test_apply_unknown_label() {
            let (_dir, repo) = setup();

            let err = guard().apply(&repo, "nope", None).await.unwrap_err();
            assert!(matches!(err, Error::Identity(IdentityError::Unknown(_))));
        }
    }
}
