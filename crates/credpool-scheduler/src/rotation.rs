//! Round-robin credential rotation with skip-on-throttled.
//!
//! The cursor (next index to consider) is persisted in the store. A scan
//! starts at the cursor, visits each credential at most once, and returns
//! the first one that is not throttled. The cursor then moves just past
//! the returned credential. A scan that finds nothing leaves the cursor
//! untouched.
//!
//! Selection and the later `record_usage` are not one critical section:
//! two callers sharing a store may both receive the same credential.

use credpool_core::Selection;
use credpool_store::KeyValueStore;
use tracing::debug;

use crate::pool::{KeyPoolManager, mask};
use crate::rate_limit::RateLimitTracker;

#[derive(Debug, Clone)]
pub struct Rotator {
    store: KeyValueStore,
    pool: KeyPoolManager,
    tracker: RateLimitTracker,
}

impl Rotator {
    pub fn new(store: KeyValueStore, pool: KeyPoolManager, tracker: RateLimitTracker) -> Self {
        Self {
            store,
            pool,
            tracker,
        }
    }

    /// Pick the next usable credential, or `None` when the pool is empty or
    /// every credential is throttled for the current window.
    ///
    /// A pool of exactly one credential is returned without a throttle
    /// check. Callers relying on the rate limit with a single key get no
    /// protection; this matches the single-key behavior that predates pools.
    pub fn select_next(&self) -> Option<Selection> {
        let pool = self.pool.list();
        match pool.len() {
            0 => {
                debug!("Credential pool is empty");
                return None;
            }
            1 => {
                return Some(Selection {
                    credential: pool[0].clone(),
                    index: 0,
                });
            }
            _ => {}
        }

        let total = pool.len();
        let cursor = self.cursor_for(total);
        let snapshot = self.tracker.snapshot();

        for offset in 0..total {
            let index = (cursor + offset) % total;
            let credential = &pool[index];
            if snapshot.is_throttled(credential) {
                debug!(credential = %mask(credential), index, "Skipping throttled credential");
                continue;
            }

            // A failed cursor write only costs fairness on the next call.
            self.store.save_cursor((index + 1) % total).ok();
            debug!(
                credential = %mask(credential),
                index,
                "Round-robin selected credential"
            );
            return Some(Selection {
                credential: credential.clone(),
                index,
            });
        }

        debug!(total, "All credentials throttled for this window");
        None
    }

    /// Current cursor, clamped to the current pool size.
    pub fn cursor(&self) -> usize {
        self.cursor_for(self.pool.list().len())
    }

    /// Keep the cursor valid after the entry at `removed_index` left a pool
    /// that now holds `new_len` credentials.
    ///
    /// Removing an entry before the cursor shifts the cursor back by one so
    /// it still points at the same upcoming credential.
    pub fn reclamp_after_removal(&self, removed_index: usize, new_len: usize) {
        let cursor = self.store.load_cursor();
        let mut next = cursor;
        if removed_index < next {
            next -= 1;
        }
        if next >= new_len {
            next = 0;
        }
        if next != cursor {
            debug!(from = cursor, to = next, "Re-clamped rotation cursor");
            // save_cursor() logs failures; an out-of-range cursor reads as 0.
            self.store.save_cursor(next).ok();
        }
    }

    fn cursor_for(&self, total: usize) -> usize {
        let cursor = self.store.load_cursor();
        if cursor >= total { 0 } else { cursor }
    }
}
