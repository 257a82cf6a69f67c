//! Client-side view cache.
//!
//! One slot per cached projection: the rows+columns snapshot of a view, or an
//! owner's view list. Slots carry a generation counter that is bumped whenever
//! a mutation begins; a refetch response is only installed if the generation
//! it was fetched under is still current, so a stale read can never overwrite
//! an optimistic write. The cache is derived state and never authoritative.

pub mod coordinator;

use crate::catalog::schema::ColumnDef;
use crate::catalog::types::Row;
use crate::catalog::view::ViewMeta;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cached snapshot of one view: its meta plus columns and rows, the shape the
/// presentation layer renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewData {
    pub view: ViewMeta,
    pub columns: im::Vector<ColumnDef>,
    pub rows: im::Vector<Row>,
}

pub(crate) type ViewListData = im::Vector<ViewMeta>;

/// Snapshot captured when a mutation begins; the exclusive source for
/// rollback. `None` means the slot had never been populated.
pub(crate) struct PendingMutation<T> {
    pub(crate) snapshot: Option<T>,
}

struct Slot<T> {
    data: Option<T>,
    fresh: bool,
    generation: u64,
    pending: usize,
    inflight: Option<JoinHandle<()>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            data: None,
            fresh: false,
            generation: 0,
            pending: 0,
            inflight: None,
        }
    }
}

pub(crate) struct SlotMap<K, T> {
    slots: Mutex<HashMap<K, Slot<T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone> SlotMap<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Phase 1 of the mutation protocol: cancel any outstanding refetch by
    /// bumping the generation and aborting the in-flight task, then snapshot
    /// whatever is cached right now. The snapshot deliberately includes the
    /// optimistic effects of other pending mutations.
    pub(crate) fn begin(&self, key: K) -> PendingMutation<T> {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_default();
        slot.generation += 1;
        if let Some(handle) = slot.inflight.take() {
            handle.abort();
        }
        slot.pending += 1;
        PendingMutation {
            snapshot: slot.data.clone(),
        }
    }

    /// Mutate the cached data in place. A slot that has never been populated
    /// stays untouched; there is nothing to update optimistically.
    pub(crate) fn patch(&self, key: &K, f: impl FnOnce(&mut T)) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            if let Some(data) = slot.data.as_mut() {
                f(data);
            }
        }
    }

    /// Rollback: put the begin snapshot back verbatim.
    pub(crate) fn restore(&self, key: K, snapshot: Option<T>) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_default();
        slot.data = snapshot;
    }

    /// Resolve: the slot is stale either way. Returns the generation to tag a
    /// refetch with, but only when this was the last pending mutation; while
    /// others are still in flight their resolve will schedule the fetch.
    pub(crate) fn resolve(&self, key: &K) -> Option<u64> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(key)?;
        slot.pending = slot.pending.saturating_sub(1);
        slot.fresh = false;
        (slot.pending == 0).then_some(slot.generation)
    }

    /// Install fetched data if the generation is still current; a response
    /// fetched before a later mutation began is dropped.
    pub(crate) fn install(&self, key: K, generation: u64, data: T) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_default();
        if slot.generation == generation {
            slot.data = Some(data);
            slot.fresh = true;
        } else {
            debug!(
                fetched_generation = generation,
                current_generation = slot.generation,
                "dropping stale refetch response"
            );
        }
    }

    /// Current generation, priming the slot so a following `install` has
    /// something to compare against.
    pub(crate) fn generation(&self, key: K) -> u64 {
        let mut slots = self.slots.lock();
        slots.entry(key).or_default().generation
    }

    /// Cached data when it is present and not marked stale.
    pub(crate) fn fresh(&self, key: &K) -> Option<T> {
        let slots = self.slots.lock();
        let slot = slots.get(key)?;
        if slot.fresh { slot.data.clone() } else { None }
    }

    /// Cached data regardless of staleness; what a renderer shows while a
    /// refresh is pending.
    pub(crate) fn peek(&self, key: &K) -> Option<T> {
        let slots = self.slots.lock();
        slots.get(key).and_then(|slot| slot.data.clone())
    }

    pub(crate) fn invalidate(&self, key: &K) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            slot.fresh = false;
        }
    }

    pub(crate) fn set_inflight(&self, key: K, handle: JoinHandle<()>) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key).or_default();
        if let Some(previous) = slot.inflight.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the slot entirely, aborting any refetch still running. Used when
    /// the underlying view is deleted.
    pub(crate) fn remove(&self, key: &K) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.remove(key) {
            if let Some(handle) = slot.inflight {
                handle.abort();
            }
        }
    }

    pub(crate) fn take_handles(&self) -> Vec<JoinHandle<()>> {
        let mut slots = self.slots.lock();
        slots
            .values_mut()
            .filter_map(|slot| slot.inflight.take())
            .collect()
    }
}

/// The process-wide cache: per-view snapshots keyed by view id and per-owner
/// view lists. Populated on first read, invalidated by every mutation against
/// the same key, torn down when a view is deleted.
pub(crate) struct ViewCache {
    pub(crate) views: SlotMap<i64, ViewData>,
    pub(crate) lists: SlotMap<String, ViewListData>,
}

impl ViewCache {
    pub(crate) fn new() -> Self {
        Self {
            views: SlotMap::new(),
            lists: SlotMap::new(),
        }
    }

    pub(crate) async fn quiesce(&self) {
        for handle in self
            .views
            .take_handles()
            .into_iter()
            .chain(self.lists.take_handles())
        {
            // Aborted and already-finished tasks both surface here as errors
            // we do not care about.
            let _ = handle.await;
        }
    }
}
