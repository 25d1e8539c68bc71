//! Counter storage for admission control.
//!
//! The store owns all mutable rate-limit state. Each access performs the
//! get-or-create and the read-modify-write under a single per-key guard, so
//! two concurrent requests for the same key can never both take the last
//! slot in a window.

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, trace};

use super::key::ClientKey;
use super::window::{WindowOutcome, WindowState, WindowStrategy};

/// Roughly one access in this many triggers an opportunistic sweep of stale
/// entries, bounding memory growth under rotating client addresses without a
/// background task.
const SWEEP_SAMPLE: u32 = 1024;
/// Minimum spacing between opportunistic sweeps.
const SWEEP_SPACING: Duration = Duration::from_secs(30);

/// Key identifying a counter: one window state per (tier, client) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// Name of the tier the counter belongs to.
    pub tier: String,
    /// The client partition within the tier.
    pub client: ClientKey,
}

impl CounterKey {
    /// Create a new counter key.
    pub fn new(tier: &str, client: ClientKey) -> Self {
        Self {
            tier: tier.to_string(),
            client,
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.client)
    }
}

#[derive(Debug)]
struct StoreEntry {
    state: WindowState,
    /// Window duration the entry was created under, kept for staleness checks.
    window: Duration,
}

/// Process-lifetime map from counter key to window state.
///
/// Thread-safe; shared across request handlers behind an `Arc`. Entries are
/// created lazily on first request and only ever removed by [`evict_stale`]
/// (or [`clear`]), never by request handling itself.
///
/// [`evict_stale`]: CounterStore::evict_stale
/// [`clear`]: CounterStore::clear
#[derive(Debug)]
pub struct CounterStore {
    counters: DashMap<CounterKey, StoreEntry>,
    last_sweep: Mutex<Option<Instant>>,
}

impl CounterStore {
    /// Create an empty counter store.
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            last_sweep: Mutex::new(None),
        }
    }

    /// Evaluate one request against the counter for `key`, creating the zero
    /// state on first sight.
    ///
    /// The per-key guard is held across the whole evaluation, making the
    /// increment atomic with respect to concurrent callers of the same key.
    pub fn apply(
        &self,
        key: CounterKey,
        strategy: WindowStrategy,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> WindowOutcome {
        self.maybe_sweep(now);

        trace!(key = %key, "Evaluating counter");

        let mut entry = self.counters.entry(key).or_insert_with(|| StoreEntry {
            state: WindowState::new(strategy, now),
            window,
        });
        entry.state.evaluate(limit, window, now)
    }

    /// Remove entries whose window has fully elapsed.
    ///
    /// Safe to call at any time; correctness never depends on it running.
    pub fn evict_stale(&self, now: Instant) {
        let before = self.counters.len();
        self.counters
            .retain(|_, entry| !entry.state.is_stale(entry.window, now));
        let evicted = before.saturating_sub(self.counters.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.counters.len(), "Evicted stale counters");
        }
    }

    /// Opportunistic sweep: sampled on access, rate limited by spacing.
    fn maybe_sweep(&self, now: Instant) {
        if !rand::thread_rng().gen_ratio(1, SWEEP_SAMPLE) {
            return;
        }
        {
            let mut last = self.last_sweep.lock();
            match *last {
                Some(at) if now.saturating_duration_since(at) < SWEEP_SPACING => return,
                _ => *last = Some(now),
            }
        }
        self.evict_stale(now);
    }

    /// Get the number of active counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Clear all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}
