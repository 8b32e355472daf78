use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::ports::repository::{Health, RepoError, RepoResult};

/// Holder for the live capability of one backend.
///
/// Empty until the first successful construction; a later install replaces
/// the previous handle, which is dropped once the last in-flight request
/// releases its clone.
pub struct BackendSlot<T: ?Sized> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> BackendSlot<T> {
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub fn install(&self, capability: Arc<T>) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(capability);
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_installed(&self) -> bool {
        self.get().is_some()
    }

    /// Drop the installed handle, closing its pool once unused.
    pub fn clear(&self) -> Option<Arc<T>> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl<T: ?Sized> Default for BackendSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl<T> Health for BackendSlot<T>
where
    T: Health + ?Sized,
{
    async fn health(&self) -> RepoResult<()> {
        let capability = self.get().ok_or(RepoError::NotConnected)?;
        capability.health().await
    }
}
