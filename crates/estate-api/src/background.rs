//! # Background Tasks
//!
//! Fire-and-forget side effects (welcome notifications) run on their own
//! tasks so they never hold up a response. Each task is supervised: a
//! failure is logged, a panic is caught at the task boundary and logged,
//! and nothing propagates back to the request that spawned it. The tracker
//! counts outstanding tasks so shutdown can wait for them, bounded by the
//! grace period.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Handle used to spawn and await supervised background tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskTracker {
    shared: Arc<Shared>,
}

/// Decrements the outstanding count however the task ends.
struct Outstanding(Arc<Shared>);

impl Drop for Outstanding {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` in the background under the given name.
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        let guard = Outstanding(self.shared.clone());
        tokio::spawn(async move {
            let _guard = guard;
            match tokio::spawn(task).await {
                Ok(Ok(())) => tracing::debug!(task = name, "background task finished"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "background task failed"),
                Err(e) if e.is_panic() => {
                    tracing::error!(task = name, "background task panicked")
                }
                Err(e) => tracing::error!(task = name, error = %e, "background task cancelled"),
            }
        });
    }

    /// Tasks still running.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Wait until no tasks are outstanding or `limit` elapses.
    ///
    /// Returns `true` if everything finished in time.
    pub async fn wait(&self, limit: Duration) -> bool {
        let drained = async {
            loop {
                let idle = self.shared.idle.notified();
                if self.outstanding() == 0 {
                    return;
                }
                idle.await;
            }
        };
        tokio::time::timeout(limit, drained).await.is_ok()
    }
}
