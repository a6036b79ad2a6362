//! Periodic identity checks for one repository

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::Scheduler;
use crate::identity::{IdentityGuard, IdentityStatus};
use crate::git::Repository;

/// Watches a repository and reports identity changes
///
/// Only transitions are reported; a status that stays the same between
/// ticks is logged once.
pub struct IdentityWatcher {
    guard: Arc<IdentityGuard>,
    repo: Repository,
    scheduler: Scheduler,
    last: Arc<Mutex<Option<IdentityStatus>>>,
}

impl IdentityWatcher {
    pub fn new(guard: IdentityGuard, repo: Repository) -> Self {
        Self {
            guard: Arc::new(guard),
            repo,
            scheduler: Scheduler::new(),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin checking every `period`
    pub fn start(&mut self, period: Duration) {
        let guard = Arc::clone(&self.guard);
        let repo = self.repo.clone();
        let last = Arc::clone(&self.last);

        info!(
            "Watching identity of {} every {:?}",
            repo.path().display(),
            period
        );

        self.scheduler.start(period, move || {
            let guard = Arc::clone(&guard);
            let repo = repo.clone();
            let last = Arc::clone(&last);
            async move { check(&guard, &repo, &last).await }
        });
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn stop(&mut self) {
        self.scheduler.stop().await;
    }

    /// Status seen on the most recent successful check
    pub async fn last_status(&self) -> Option<IdentityStatus> {
        self.last.lock().await.clone()
    }
}

async fn check(guard: &IdentityGuard, repo: &Repository, last: &Mutex<Option<IdentityStatus>>) {
    let status = match guard.check(repo).await {
        Ok(status) => status,
        Err(e) => {
            warn!("Identity check failed for {}: {}", repo.path().display(), e);
            return;
        }
    };

    let mut last = last.lock().await;
    if last.as_ref() == Some(&status) {
        return;
    }

    if status.needs_attention() {
        warn!("{}: {}", repo.path().display(), status);
    } else {
        info!("{}: {}", repo.path().display(), status);
    }
    *last = Some(status);
}
