use std::{borrow::Cow, sync::Arc};

use crate::{
    Clock, EngineError, Group, MemoryStore, Period, ResultEngine, SystemClock,
    store::{Groups, Store},
};

mod expenses;
mod meals;
mod members;
mod queries;
mod settlement;

pub use settlement::Rotation;

/// Owns every group's ledger.
///
/// Mutating operations take `&mut self`: callers running on several tasks
/// serialize access themselves, e.g. behind a `tokio::sync::Mutex`.
#[derive(Debug)]
pub struct Engine {
    groups: Groups,
    store: Box<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The group, created on first reference in the period containing the
    /// clock's calendar date.
    fn group_mut(&mut self, group_id: &str) -> &mut Group {
        let now = self.clock.now();
        let period = Period::containing(self.clock.today());
        self.groups.entry(group_id.to_string()).or_insert_with(|| {
            tracing::debug!("creating group {group_id} in {period}");
            Group::new(group_id, now, period)
        })
    }

    /// Read-only view of a group. Unknown ids read as a fresh, empty group
    /// without being inserted.
    fn group_view(&self, group_id: &str) -> Cow<'_, Group> {
        match self.groups.get(group_id) {
            Some(group) => Cow::Borrowed(group),
            None => Cow::Owned(Group::new(
                group_id,
                self.clock.now(),
                Period::containing(self.clock.today()),
            )),
        }
    }

    /// Write the full state. The in-memory mutation stays applied when this
    /// fails, so the error must reach the caller.
    async fn persist(&self) -> ResultEngine<()> {
        self.store.save(&self.groups).await.map_err(|err| {
            tracing::error!("failed to persist ledger: {err}");
            EngineError::Persistence(err)
        })
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Box<dyn Store>>,
    clock: Option<Arc<dyn Clock>>,
}

impl EngineBuilder {
    /// Pass the store holding the ledger. Defaults to an empty [`MemoryStore`].
    pub fn store(mut self, store: impl Store + 'static) -> EngineBuilder {
        self.store = Some(Box::new(store));
        self
    }

    /// Pass the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> EngineBuilder {
        self.clock = Some(clock);
        self
    }

    /// Construct `Engine`, loading the whole ledger from the store.
    pub async fn build(self) -> ResultEngine<Engine> {
        let store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let groups = store.load(clock.as_ref()).await?;
        tracing::info!("loaded {} group(s)", groups.len());
        Ok(Engine {
            groups,
            store,
            clock,
        })
    }
}
