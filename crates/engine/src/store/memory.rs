//! In-memory store, deterministic and test-friendly.
//!
//! Clones share the same state so a test can keep a handle after giving the
//! store to the engine.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use super::{Groups, Store, StoreError, StoreResult};
use crate::Clock;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    groups: RwLock<Groups>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first load returns `groups`.
    pub fn with_groups(groups: Groups) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.inner.groups.write() {
            *guard = groups;
        }
        store
    }

    /// Last saved state.
    pub fn snapshot(&self) -> Groups {
        self.inner
            .groups
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of successful saves so far.
    pub fn saves(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail, to exercise persistence failures.
    pub fn fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, _clock: &dyn Clock) -> StoreResult<Groups> {
        self.inner
            .groups
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::Malformed("memory store lock poisoned".to_string()))
    }

    async fn save(&self, groups: &Groups) -> StoreResult<()> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "memory store configured to fail",
            )));
        }
        let mut guard = self
            .inner
            .groups
            .write()
            .map_err(|_| StoreError::Malformed("memory store lock poisoned".to_string()))?;
        *guard = groups.clone();
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
