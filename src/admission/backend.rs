//! Backend trait for abstracting admission engine implementations.

use async_trait::async_trait;

use super::gate::{AdmissionControl, Decision};
use super::key::RequestInfo;

/// Trait for admission engine implementations.
///
/// Servers wire their middleware against this seam so the in-process
/// [`AdmissionControl`] can later be swapped for an out-of-process counting
/// authority, or for a test double, without touching call sites.
#[async_trait]
pub trait AdmissionBackend: Send + Sync {
    /// Check a request against every applicable tier.
    async fn check(&self, request: &RequestInfo) -> Decision;
}

#[async_trait]
impl AdmissionBackend for AdmissionControl {
    async fn check(&self, request: &RequestInfo) -> Decision {
        AdmissionControl::check(self, request).await
    }
}
