use std::sync::{Arc, PoisonError, RwLock};

use super::snapshot::StatusSnapshot;

/// Holds the current snapshot behind a single swappable handle.
///
/// Writers replace the whole `Arc` in one assignment; readers clone the
/// `Arc` out and drop the lock immediately. A reader therefore sees either
/// the old snapshot or the new one, never a mix of fields from both.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    inner: RwLock<Option<Arc<StatusSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or `None` while disconnected.
    pub fn load(&self) -> Option<Arc<StatusSnapshot>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new value and hand back the previous one.
    pub fn replace(&self, next: Option<Arc<StatusSnapshot>>) -> Option<Arc<StatusSnapshot>> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
