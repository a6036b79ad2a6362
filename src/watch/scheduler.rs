//! Single repeating task with an explicit lifecycle

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// Owns at most one repeating task
///
/// The task runs once immediately and then every `period`. A tick never
/// overlaps the previous one; late ticks are delayed, not bunched.
#[derive(Debug, Default)]
pub struct Scheduler {
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start running `task` every `period`, replacing any running task
    pub fn start<F, Fut>(&mut self, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.running.take() {
            let _ = previous.stop.send(());
            previous.handle.abort();
        }

        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = interval.tick() => task().await,
                }
            }
            debug!("Scheduler task stopped");
        });

        self.running = Some(Running { stop, handle });
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Stop the task and wait for it to finish its current tick
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(());
            let _ = running.handle.await;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}
