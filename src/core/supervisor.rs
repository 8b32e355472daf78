use std::{
    collections::HashSet,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio_util::task::TaskTracker;

use crate::core::{backend::Backend, reconnector::ReconnectOutcome};

/// Hook the health aggregator calls when a ready backend fails its probe and
/// recovery on failure is enabled.
pub trait Recover: Send + Sync {
    /// Demote `backend` and start a reconnector for it. Returns `false` when a
    /// reconnector is already polling that backend.
    fn recover(&self, backend: Backend) -> bool;
}

/// Owner of every background task the service spawns.
///
/// Tasks go through a [`TaskTracker`] so shutdown can wait for them
/// deterministically. Reconnectors are additionally keyed by backend: at most
/// one may poll a given backend at a time.
#[derive(Clone, Default)]
pub struct Supervisor {
    tracker: TaskTracker,
    active: Arc<Mutex<HashSet<Backend>>>,
}

/// Removes the backend from the active set when the task ends, even by panic.
struct ActiveGuard {
    backend: Backend,
    active: Arc<Mutex<HashSet<Backend>>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.backend);
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a reconnector for `backend` unless one is already polling.
    ///
    /// Returns `false` (and drops `task` unstarted) when refused.
    pub fn spawn_reconnector<F>(&self, backend: Backend, task: F) -> bool
    where
        F: Future<Output = ReconnectOutcome> + Send + 'static,
    {
        {
            let mut active = self
                .active
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !active.insert(backend) {
                tracing::warn!(%backend, "Reconnector already running, refusing a second one");
                return false;
            }
        }

        let guard = ActiveGuard {
            backend,
            active: self.active.clone(),
        };
        self.tracker.spawn(async move {
            let _guard = guard;
            let outcome = task.await;
            tracing::debug!(%backend, ?outcome, "Reconnector finished");
            outcome
        });
        true
    }

    /// Spawn a long-lived tracked task (the health aggregator).
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    pub fn is_reconnecting(&self, backend: Backend) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&backend)
    }

    pub fn task_count(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting tasks and wait up to `grace` for running ones.
    ///
    /// Returns `true` when every task finished in time. Tasks only finish once
    /// the shutdown token they were given has fired.
    pub async fn close(&self, grace: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
