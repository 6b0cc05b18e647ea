//! Statistics cache (spec §4.7): a per-type array of document-frequency
//! counters, indexed by term-id. Both the type-table and each type's
//! counters array are snapshot pointers (`ArcSwap`): reads only ever load a
//! snapshot, never touching a lock; writers serialize against each other
//! through `write_lock` and publish new snapshots via `store`. Grounded in
//! `stats/documentFrequencyCache.hpp`'s geometric-growth, copy-on-grow
//! design, re-expressed with `arc_swap::ArcSwap` in place of hand-rolled
//! atomic shared pointers.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::errors::{CoreError, CoreResult};

const INITIAL_CAPACITY: usize = 64;

struct TypeCounters {
    counts: ArcSwap<Vec<i64>>,
}

impl TypeCounters {
    fn new() -> Self {
        Self { counts: ArcSwap::from_pointee(vec![0i64; INITIAL_CAPACITY]) }
    }
}

/// One df increment to apply as part of a batch.
#[derive(Debug, Clone, Copy)]
pub struct DfIncrement {
    pub type_id: u32,
    pub term_id: u32,
    pub delta: i64,
}

pub struct StatisticsCache {
    types: ArcSwap<HashMap<u32, Arc<TypeCounters>>>,
    write_lock: Mutex<()>,
}

impl Default for StatisticsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsCache {
    pub fn new() -> Self {
        Self { types: ArcSwap::from_pointee(HashMap::new()), write_lock: Mutex::new(()) }
    }

    /// Looks up or creates the per-type counters array. Called only from
    /// `apply_one`, which requires `write_lock` already held by its caller
    /// — this never takes the lock itself, so it never contends with a
    /// concurrent reader's lock-free `get`.
    fn type_counters(&self, type_id: u32) -> Arc<TypeCounters> {
        let current = self.types.load_full();
        if let Some(existing) = current.get(&type_id) {
            return existing.clone();
        }
        let mut next = (*current).clone();
        let counters = Arc::new(TypeCounters::new());
        next.insert(type_id, counters.clone());
        self.types.store(Arc::new(next));
        counters
    }

    /// Lock-free read of the current df for `(type_id, term_id)`; absent
    /// types or out-of-range term-ids read as zero. Never contends with a
    /// concurrent writer: both the type-table and the per-type counters
    /// are snapshot pointers swapped atomically on write.
    pub fn get(&self, type_id: u32, term_id: u32) -> i64 {
        match self.types.load().get(&type_id) {
            Some(counters) => counters.counts.load().get(term_id as usize).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// Applies a batch of increments atomically per type: on any
    /// intra-batch error the whole batch is reverted in reverse order
    /// before the error is returned, leaving the cache untouched. Writers
    /// serialize against each other through `write_lock`; readers never
    /// take it.
    pub fn apply_batch(&self, batch: &[DfIncrement]) -> CoreResult<()> {
        let _guard = self.write_lock.lock();
        let mut applied = Vec::with_capacity(batch.len());
        for increment in batch {
            match self.apply_one(increment) {
                Ok(()) => applied.push(*increment),
                Err(e) => {
                    for reverted in applied.iter().rev() {
                        let _ = self.apply_one(&DfIncrement { delta: -reverted.delta, ..*reverted });
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Applies a single increment. Must be called with `write_lock` held —
    /// `apply_batch` is the only caller and holds it for the whole batch so
    /// revert-on-error stays consistent.
    fn apply_one(&self, increment: &DfIncrement) -> CoreResult<()> {
        let counters = self.type_counters(increment.type_id);
        let current = counters.counts.load();
        let needed = increment.term_id as usize + 1;
        let mut next = if current.len() >= needed {
            (**current).clone()
        } else {
            let mut grown = (**current).clone();
            grown.resize(needed.next_power_of_two().max(current.len() * 2), 0);
            grown
        };
        let slot = &mut next[increment.term_id as usize];
        let updated = *slot + increment.delta;
        if updated < 0 {
            return Err(CoreError::invariant("document frequency cache went negative"));
        }
        *slot = updated;
        counters.counts.store(Arc::new(next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_batch_updates_every_touched_counter() {
        let cache = StatisticsCache::new();
        let batch = vec![
            DfIncrement { type_id: 1, term_id: 5, delta: 3 },
            DfIncrement { type_id: 1, term_id: 5, delta: 2 },
            DfIncrement { type_id: 1, term_id: 9, delta: 1 },
        ];
        cache.apply_batch(&batch).unwrap();
        assert_eq!(cache.get(1, 5), 5);
        assert_eq!(cache.get(1, 9), 1);
        assert_eq!(cache.get(2, 5), 0);
    }

    #[test]
    fn apply_batch_reverts_on_intra_batch_error() {
        let cache = StatisticsCache::new();
        cache.apply_batch(&[DfIncrement { type_id: 1, term_id: 0, delta: 2 }]).unwrap();
        let batch = vec![
            DfIncrement { type_id: 1, term_id: 0, delta: 1 },
            DfIncrement { type_id: 1, term_id: 0, delta: -100 },
        ];
        assert!(cache.apply_batch(&batch).is_err());
        assert_eq!(cache.get(1, 0), 2);
    }

    #[test]
    fn grows_geometrically_past_initial_capacity() {
        let cache = StatisticsCache::new();
        cache.apply_batch(&[DfIncrement { type_id: 1, term_id: 1000, delta: 4 }]).unwrap();
        assert_eq!(cache.get(1, 1000), 4);
    }
}
