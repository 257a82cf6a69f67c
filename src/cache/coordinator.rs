//! The optimistic mutation protocol.
//!
//! Every mutating operation runs the same four phases against the slot of the
//! projection it affects:
//!
//! 1. begin: cancel outstanding refetches for the slot and snapshot the
//!    current cache state;
//! 2. optimistic apply: synthesize the post-mutation state locally and
//!    publish it before the durable write is confirmed;
//! 3. commit: issue the durable write; on success swap synthetic identities
//!    for authoritative ones and invoke the caller's continuation;
//! 4. resolve: mark the slot stale; on failure first restore the begin
//!    snapshot, then surface the error as the operation's result.
//!
//! Mutations compose: a later begin snapshots the cache with earlier
//! optimistic effects included, and a rollback restores only to its own begin
//! snapshot. Failures never propagate as panics; the caller gets the typed
//! error together with a cache already rolled back.

use crate::cache::SlotMap;
use crate::error::GridError;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use tracing::{debug, warn};

pub(crate) async fn run_mutation<K, T, R>(
    slots: &SlotMap<K, T>,
    key: K,
    optimistic: impl FnOnce(&mut T),
    commit: impl Future<Output = Result<R, GridError>>,
    fixup: impl FnOnce(&mut T, &R),
    after_commit: impl FnOnce(&R),
    refetch: impl FnOnce(u64),
) -> Result<R, GridError>
where
    K: Eq + Hash + Clone + Debug,
    T: Clone,
{
    let pending = slots.begin(key.clone());
    debug!(key = ?key, "mutation begun");
    slots.patch(&key, optimistic);

    let result = commit.await;
    match &result {
        Ok(value) => {
            debug!(key = ?key, "mutation committed");
            slots.patch(&key, |data| fixup(data, value));
            after_commit(value);
        }
        Err(error) => {
            warn!(error = %error, code = error.code_str(), "mutation failed, rolling back");
            slots.restore(key.clone(), pending.snapshot);
        }
    }

    if let Some(generation) = slots.resolve(&key) {
        refetch(generation);
    }
    result
}
