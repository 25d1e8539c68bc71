//! Window accounting for admission decisions.
//!
//! Two interchangeable strategies are provided. Fixed windows reset the
//! counter at interval boundaries: O(1) memory per key, but a caller can burst
//! up to twice the limit across a boundary. The sliding log keeps individual
//! hit timestamps for a strictly rolling limit at O(limit) memory per key.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Counting strategy for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStrategy {
    /// Counter resets at fixed interval boundaries.
    Fixed,
    /// Individual timestamps enforce a strictly rolling limit.
    Sliding,
}

impl Default for WindowStrategy {
    fn default() -> Self {
        WindowStrategy::Fixed
    }
}

/// Per-(tier, key) counting state.
#[derive(Debug, Clone)]
pub enum WindowState {
    /// Fixed-window counter.
    Fixed {
        /// When the current window started.
        window_start: Instant,
        /// Requests admitted in the current window.
        count: u32,
    },
    /// Sliding-window log of admitted hit times, oldest first. Entries older
    /// than the window are purged lazily on access, never by a background
    /// sweep.
    Sliding {
        /// Admission timestamps within the last window.
        hits: VecDeque<Instant>,
    },
}

/// Result of evaluating one request against one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Whether the request was admitted.
    pub admitted: bool,
    /// Slots left in the window after this request.
    pub remaining: u32,
    /// Time until the window can next grant a fresh slot.
    pub reset_after: Duration,
    /// On rejection, how long the caller should wait before retrying.
    pub retry_after: Option<Duration>,
}

impl WindowState {
    /// Create the zero state for a strategy.
    pub fn new(strategy: WindowStrategy, now: Instant) -> Self {
        match strategy {
            WindowStrategy::Fixed => WindowState::Fixed {
                window_start: now,
                count: 0,
            },
            WindowStrategy::Sliding => WindowState::Sliding {
                hits: VecDeque::new(),
            },
        }
    }

    /// Evaluate one request against this window, updating the state.
    ///
    /// The limit is inclusive: `limit` requests are admitted per window and
    /// the `limit + 1`-th rejects. `remaining` never goes negative and the
    /// reported reset never moves backwards within a window.
    pub fn evaluate(&mut self, limit: u32, window: Duration, now: Instant) -> WindowOutcome {
        match self {
            WindowState::Fixed { window_start, count } => {
                if now.saturating_duration_since(*window_start) >= window {
                    *window_start = now;
                    *count = 0;
                }

                let reset_after = (*window_start + window).saturating_duration_since(now);

                if *count < limit {
                    *count += 1;
                    WindowOutcome {
                        admitted: true,
                        remaining: limit - *count,
                        reset_after,
                        retry_after: None,
                    }
                } else {
                    WindowOutcome {
                        admitted: false,
                        remaining: 0,
                        reset_after,
                        retry_after: Some(reset_after),
                    }
                }
            }
            WindowState::Sliding { hits } => {
                while let Some(&oldest) = hits.front() {
                    if now.saturating_duration_since(oldest) >= window {
                        hits.pop_front();
                    } else {
                        break;
                    }
                }

                if (hits.len() as u32) < limit {
                    hits.push_back(now);
                    // The just-recorded hit may itself be the oldest.
                    let oldest = *hits.front().unwrap_or(&now);
                    WindowOutcome {
                        admitted: true,
                        remaining: limit - hits.len() as u32,
                        reset_after: (oldest + window).saturating_duration_since(now),
                        retry_after: None,
                    }
                } else {
                    let oldest = *hits.front().unwrap_or(&now);
                    let until_slot = (oldest + window).saturating_duration_since(now);
                    WindowOutcome {
                        admitted: false,
                        remaining: 0,
                        reset_after: until_slot,
                        retry_after: Some(until_slot),
                    }
                }
            }
        }
    }

    /// Whether this state's window has fully elapsed with nothing left to
    /// count, making the entry reclaimable.
    pub fn is_stale(&self, window: Duration, now: Instant) -> bool {
        match self {
            WindowState::Fixed { window_start, .. } => {
                now.saturating_duration_since(*window_start) >= window
            }
            WindowState::Sliding { hits } => match hits.back() {
                Some(&newest) => now.saturating_duration_since(newest) >= window,
                None => true,
            },
        }
    }
}
