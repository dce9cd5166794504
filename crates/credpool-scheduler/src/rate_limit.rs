//! Sliding-window request counting per credential.
//!
//! A credential is throttled once it has `max_requests` recorded uses
//! within the last `window`. Expired timestamps never count and are
//! pruned whenever the history is rewritten.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use credpool_config::RateLimitConfig;
use credpool_store::{KeyValueStore, StoreError, UsageHistory};
use tracing::debug;

use crate::pool::mask;

/// Millisecond wall clock.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from(&RateLimitConfig::default())
    }
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            window: config.window(),
            max_requests: config.max_requests,
        }
    }
}

impl RateLimitPolicy {
    fn window_millis(&self) -> i64 {
        duration_millis(self.window)
    }

    fn in_window(&self, timestamp: i64, now: i64) -> bool {
        now - timestamp < self.window_millis()
    }
}

/// Usage history frozen at one instant, for answering many throttle
/// questions with a single storage read.
#[derive(Debug, Clone)]
pub struct ThrottleSnapshot {
    usage: UsageHistory,
    now: i64,
    policy: RateLimitPolicy,
}

impl ThrottleSnapshot {
    pub fn recent_usage(&self, credential: &str) -> usize {
        self.usage.get(credential).map_or(0, |timestamps| {
            timestamps
                .iter()
                .filter(|&&ts| self.policy.in_window(ts, self.now))
                .count()
        })
    }

    pub fn is_throttled(&self, credential: &str) -> bool {
        self.recent_usage(credential) >= self.policy.max_requests as usize
    }
}

#[derive(Clone)]
pub struct RateLimitTracker {
    store: KeyValueStore,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RateLimitTracker {
    pub fn new(store: KeyValueStore, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        ThrottleSnapshot {
            usage: self.store.load_usage(),
            now: self.clock.now_millis(),
            policy: self.policy,
        }
    }

    /// A credential with no history is never throttled.
    pub fn is_throttled(&self, credential: &str) -> bool {
        self.snapshot().is_throttled(credential)
    }

    pub fn recent_usage(&self, credential: &str) -> usize {
        self.snapshot().recent_usage(credential)
    }

    /// Record one dispatched request for `credential`.
    ///
    /// Call after the request is actually sent, not when the credential is
    /// merely selected, or the count runs ahead of real traffic.
    pub fn record_usage(&self, credential: &str) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut usage = self.store.load_usage();
        self.prune(&mut usage, now);
        let timestamps = usage.entry(credential.to_string()).or_default();
        timestamps.push(now);
        debug!(
            credential = %mask(credential),
            in_window = timestamps.len(),
            "Recorded credential usage"
        );
        self.store.save_usage(&usage)
    }

    /// Drop all history for one credential.
    pub fn forget(&self, credential: &str) -> Result<(), StoreError> {
        let mut usage = self.store.load_usage();
        if usage.remove(credential).is_none() {
            return Ok(());
        }
        self.store.save_usage(&usage)
    }

    /// Drop all history.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.store.clear_usage()
    }

    fn prune(&self, usage: &mut UsageHistory, now: i64) {
        for timestamps in usage.values_mut() {
            timestamps.retain(|&ts| self.policy.in_window(ts, now));
        }
        usage.retain(|_, timestamps| !timestamps.is_empty());
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
