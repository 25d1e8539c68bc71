//! Standardized response semantics for admission decisions.
//!
//! The engine never touches the HTTP layer itself; callers feed a
//! [`Decision`] through these helpers to get the 429 body and the advisory
//! quota headers.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::admission::Decision;

/// Header conveying the reported tier's request limit.
pub const LIMIT: &str = "X-RateLimit-Limit";
/// Header conveying the remaining quota in the window.
pub const REMAINING: &str = "X-RateLimit-Remaining";
/// Header conveying the window reset time as unix epoch seconds.
pub const RESET: &str = "X-RateLimit-Reset";
/// Header conveying how long a rejected caller should wait, in seconds.
pub const RETRY_AFTER: &str = "Retry-After";

/// Structured body for a 429 response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectionBody {
    /// The rejecting tier's message.
    pub error: String,
}

impl From<&Decision> for RejectionBody {
    fn from(decision: &Decision) -> Self {
        Self {
            error: decision
                .message
                .clone()
                .unwrap_or_else(|| "Too many requests".to_string()),
        }
    }
}

/// Render the JSON body for a rejected request.
pub fn rejection_body(decision: &Decision) -> serde_json::Value {
    serde_json::json!(RejectionBody::from(decision))
}

/// Render the advisory headers for a decision.
///
/// Returns an empty list when the reported tier has headers disabled. On
/// rejection a `Retry-After` header is included, rounded up to at least one
/// second so clients never retry immediately.
pub fn quota_headers(decision: &Decision) -> Vec<(&'static str, String)> {
    if !decision.emit_headers {
        return Vec::new();
    }

    let mut headers = vec![
        (LIMIT, decision.limit.to_string()),
        (REMAINING, decision.remaining.to_string()),
        (RESET, reset_epoch(decision.reset_after).to_string()),
    ];

    if let Some(retry_after) = decision.retry_after {
        headers.push((RETRY_AFTER, whole_seconds(retry_after).to_string()));
    }

    headers
}

/// Unix timestamp at which the window resets.
fn reset_epoch(reset_after: Duration) -> i64 {
    let delta = ChronoDuration::from_std(reset_after).unwrap_or(ChronoDuration::MAX);
    Utc::now()
        .checked_add_signed(delta)
        .map(|at| at.timestamp())
        .unwrap_or(i64::MAX)
}

/// Round a duration up to whole seconds, never below one.
fn whole_seconds(duration: Duration) -> u64 {
    let mut secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.max(1)
}
