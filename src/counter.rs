use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::record::Level;

pub(crate) const SHARDS_PER_LEVEL: usize = 4096;
/// One bucket per named level, TRACE through ERROR.
const LEVEL_BUCKETS: usize =
    ((Level::ERROR.severity() - Level::TRACE.severity()) / Level::GAP) as usize + 1;

/// A fixed table of counters, sharded by level bucket and hashed key.
///
/// Distinct keys may share a counter. Rate limiting is approximate.
pub(crate) struct CounterTable {
    counters: Box<[Counter]>,
}

impl CounterTable {
    pub(crate) fn new() -> Self {
        Self {
            counters: (0..LEVEL_BUCKETS * SHARDS_PER_LEVEL)
                .map(|_| Counter::default())
                .collect(),
        }
    }

    pub(crate) fn get(&self, level: Level, key: &str) -> &Counter {
        &self.counters[shard_index(level, key)]
    }
}

pub(crate) fn shard_index(level: Level, key: &str) -> usize {
    let level = level.clamp(Level::TRACE, Level::ERROR);
    let bucket = ((level.severity() - Level::TRACE.severity()) / Level::GAP) as usize;
    let shard = fnv32a(key.as_bytes()) as usize % SHARDS_PER_LEVEL;
    bucket * SHARDS_PER_LEVEL + shard
}

fn fnv32a(bytes: &[u8]) -> u32 {
    const OFFSET: u32 = 2166136261;
    const PRIME: u32 = 16777619;

    bytes.iter().fold(OFFSET, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(PRIME)
    })
}

#[derive(Default)]
pub(crate) struct Counter {
    reset_at: AtomicI64,
    count: AtomicU64,
}

impl Counter {
    /// Returns this call's ordinal within the current window, starting a new
    /// window if the previous one has expired.
    pub(crate) fn increment(&self, now: i64, interval: i64) -> u64 {
        let reset_at = self.reset_at.load(Ordering::SeqCst);
        if now < reset_at {
            return self.count.fetch_add(1, Ordering::SeqCst) + 1;
        }

        self.count.store(1, Ordering::SeqCst);
        let next_reset_at = now.saturating_add(interval);
        if self
            .reset_at
            .compare_exchange(reset_at, next_reset_at, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Lost the race to another caller, which also stored 1.
            return self.count.fetch_add(1, Ordering::SeqCst) + 1;
        }

        1
    }
}
