//! Process-wide readiness flags, one per backend.
//!
//! A single mutex guards the whole map. Critical sections are plain map
//! accesses; nothing performs I/O or awaits while holding the lock.
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crate::core::backend::Backend;

#[derive(Debug, Default)]
pub struct ReadinessRegistry {
    states: Mutex<HashMap<Backend, bool>>,
}

impl ReadinessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the flag for `backend`. No notification is emitted.
    pub fn set_ready(&self, backend: Backend, ready: bool) {
        self.lock().insert(backend, ready);
    }

    /// Stored flag for `backend`; a backend never set reads as not ready.
    pub fn is_ready(&self, backend: Backend) -> bool {
        self.lock().get(&backend).copied().unwrap_or(false)
    }

    /// Copy of every flag, in [`Backend::ALL`] order.
    pub fn snapshot(&self) -> Vec<(Backend, bool)> {
        let states = self.lock();
        Backend::ALL
            .into_iter()
            .map(|b| (b, states.get(&b).copied().unwrap_or(false)))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Backend, bool>> {
        // A panic elsewhere cannot leave a bool map half-written.
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
