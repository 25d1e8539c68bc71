//! The admission middleware: the boundary-facing entry point.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::AdmissionConfig;
use crate::error::Result;

use super::key::RequestInfo;
use super::store::{CounterKey, CounterStore};
use super::tiers::TierRegistry;

/// The outcome of an admission check.
///
/// On `admitted == false` the caller translates this into a 429-class
/// response; the [`headers`](crate::headers) module renders the standard
/// payload and advisory headers from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub admitted: bool,
    /// The limit of the tier reported in this decision.
    pub limit: u32,
    /// Remaining quota in that tier; always 0 on rejection.
    pub remaining: u32,
    /// Time until that tier's window can next grant a fresh slot.
    pub reset_after: Duration,
    /// On rejection, how long the caller should wait before retrying.
    pub retry_after: Option<Duration>,
    /// Name of the reported tier; empty when no tier applied.
    pub tier: String,
    /// The rejected tier's message; `None` on admission.
    pub message: Option<String>,
    /// Whether the reported tier wants quota headers emitted.
    pub emit_headers: bool,
}

impl Decision {
    /// Decision for a request no tier applies to.
    fn unguarded() -> Self {
        Self {
            admitted: true,
            limit: 0,
            remaining: 0,
            reset_after: Duration::ZERO,
            retry_after: None,
            tier: String::new(),
            message: None,
            emit_headers: false,
        }
    }
}

/// The admission-control engine.
///
/// Holds the tier registry, the counter store and the clock; shared across
/// request handlers behind an `Arc`. Created once at process start and never
/// reset.
#[derive(Debug)]
pub struct AdmissionControl {
    registry: TierRegistry,
    store: CounterStore,
    clock: Arc<dyn Clock>,
}

impl AdmissionControl {
    /// Create an engine over the given registry, using the system clock.
    pub fn new(registry: TierRegistry) -> Self {
        Self::with_clock(registry, Arc::new(SystemClock::new()))
    }

    /// Create an engine with an injected clock.
    pub fn with_clock(registry: TierRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            store: CounterStore::new(),
            clock,
        }
    }

    /// Build an engine straight from configuration.
    pub fn from_config(config: AdmissionConfig) -> Result<Self> {
        Ok(Self::new(TierRegistry::new(config)?))
    }

    /// Check a request against every applicable tier.
    ///
    /// Tiers are consulted broadest scope first; the first rejecting tier
    /// short-circuits and its metadata is returned. Each consulted tier's
    /// counter is incremented before the next is looked at, so a rejection
    /// does not refund quota already spent in earlier tiers. When every tier
    /// admits, the decision carries the tier with the fewest remaining slots,
    /// the one that will reject the caller next.
    pub async fn check(&self, request: &RequestInfo) -> Decision {
        let now = self.clock.now();
        let mut binding: Option<Decision> = None;

        for tier in self.registry.tiers_for(request.route) {
            let key = CounterKey::new(&tier.name, tier.key_selector.extract(request));

            trace!(key = %key, "Checking admission");

            let outcome =
                self.store
                    .apply(key.clone(), tier.strategy, tier.max_requests, tier.window, now);

            if !outcome.admitted {
                debug!(
                    key = %key,
                    limit = tier.max_requests,
                    "Admission rejected"
                );
                return Decision {
                    admitted: false,
                    limit: tier.max_requests,
                    remaining: 0,
                    reset_after: outcome.reset_after,
                    retry_after: outcome.retry_after,
                    tier: tier.name.clone(),
                    message: Some(tier.message.clone()),
                    emit_headers: tier.emit_headers,
                };
            }

            let candidate = Decision {
                admitted: true,
                limit: tier.max_requests,
                remaining: outcome.remaining,
                reset_after: outcome.reset_after,
                retry_after: None,
                tier: tier.name.clone(),
                message: None,
                emit_headers: tier.emit_headers,
            };

            binding = match binding {
                Some(current) if current.remaining <= candidate.remaining => Some(current),
                _ => Some(candidate),
            };
        }

        binding.unwrap_or_else(Decision::unguarded)
    }

    /// Remove stale counters now.
    ///
    /// The store already sweeps opportunistically; this is for callers that
    /// want an explicit maintenance hook.
    pub fn evict_stale(&self) {
        self.store.evict_stale(self.clock.now());
    }

    /// Get the number of active counters.
    pub fn counter_count(&self) -> usize {
        self.store.len()
    }

    /// Clear all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::key::RouteClass;
    use crate::clock::MockClock;
    use std::net::IpAddr;
    use std::time::Instant;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn engine_with_mock_clock(yaml: &str) -> (AdmissionControl, MockClock) {
        let config = AdmissionConfig::from_yaml(yaml).unwrap();
        let registry = TierRegistry::new(config).unwrap();
        let clock = MockClock::new(Instant::now());
        let engine = AdmissionControl::with_clock(registry, Arc::new(clock.clone()));
        (engine, clock)
    }

    const TWO_TIER: &str = r#"
tiers:
  - name: global
    scope: global
    window_secs: 60
    max_requests: 300
  - name: auth
    scope: authentication
    window_secs: 60
    max_requests: 10
    message: "Too many authentication attempts, please try again later."
"#;

    #[tokio::test]
    async fn test_stricter_tier_rejects_even_when_global_would_admit() {
        let (engine, _clock) = engine_with_mock_clock(TWO_TIER);
        let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::Authentication);

        for i in 0..10 {
            let decision = engine.check(&request).await;
            assert!(decision.admitted, "auth call {} should be admitted", i + 1);
        }

        // The 11th auth call is over the auth limit although the global
        // counter sits at 11 of 300.
        let decision = engine.check(&request).await;
        assert!(!decision.admitted);
        assert_eq!(decision.tier, "auth");
        assert_eq!(decision.remaining, 0);
        assert_eq!(
            decision.message.as_deref(),
            Some("Too many authentication attempts, please try again later.")
        );
    }

    #[tokio::test]
    async fn test_rejection_reports_retry_after_and_window_reset_readmits() {
        let yaml = r#"
tiers:
  - name: api
    scope: general_api
    window_secs: 60
    max_requests: 10
"#;
        let (engine, clock) = engine_with_mock_clock(yaml);
        let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::GeneralApi);

        for _ in 0..10 {
            assert!(engine.check(&request).await.admitted);
        }

        let rejected = engine.check(&request).await;
        assert!(!rejected.admitted);
        let retry_after = rejected.retry_after.expect("rejection carries retry_after");
        assert!(retry_after <= Duration::from_secs(60));

        clock.advance(Duration::from_secs(61));
        let decision = engine.check(&request).await;
        assert!(decision.admitted);
        assert_eq!(decision.remaining, 9);
    }

    #[tokio::test]
    async fn test_admitted_decision_reports_most_constrained_tier() {
        let (engine, _clock) = engine_with_mock_clock(TWO_TIER);
        let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::Authentication);

        let decision = engine.check(&request).await;
        assert!(decision.admitted);
        assert_eq!(decision.tier, "auth");
        assert_eq!(decision.limit, 10);
        assert_eq!(decision.remaining, 9);
    }

    #[tokio::test]
    async fn test_anonymous_requests_share_one_bucket() {
        let yaml = r#"
tiers:
  - name: api
    scope: general_api
    window_secs: 60
    max_requests: 3
"#;
        let (engine, _clock) = engine_with_mock_clock(yaml);

        // Three address-less requests exhaust the shared bucket; a fourth is
        // rejected even though each could come from a different client.
        let request = RequestInfo::anonymous(RouteClass::GeneralApi);
        for _ in 0..3 {
            assert!(engine.check(&request).await.admitted);
        }
        assert!(!engine.check(&request).await.admitted);

        // A client with a resolvable address is unaffected.
        let known = RequestInfo::new(addr("10.0.0.1"), RouteClass::GeneralApi);
        assert!(engine.check(&known).await.admitted);
    }

    #[tokio::test]
    async fn test_separate_clients_have_separate_quota() {
        let (engine, _clock) = engine_with_mock_clock(TWO_TIER);

        let first = RequestInfo::new(addr("10.0.0.1"), RouteClass::Authentication);
        for _ in 0..10 {
            engine.check(&first).await;
        }
        assert!(!engine.check(&first).await.admitted);

        let second = RequestInfo::new(addr("10.0.0.2"), RouteClass::Authentication);
        assert!(engine.check(&second).await.admitted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_simultaneous_calls_admit_exactly_limit() {
        let yaml = r#"
tiers:
  - name: api
    scope: general_api
    window_secs: 60
    max_requests: 20
"#;
        let (engine, _clock) = engine_with_mock_clock(yaml);
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..40 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::GeneralApi);
                engine.check(&request).await.admitted
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 20);
    }

    #[tokio::test]
    async fn test_no_applicable_tier_admits_without_headers() {
        let yaml = r#"
tiers:
  - name: auth
    scope: authentication
    max_requests: 10
"#;
        let (engine, _clock) = engine_with_mock_clock(yaml);
        let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::GeneralApi);

        let decision = engine.check(&request).await;
        assert!(decision.admitted);
        assert!(!decision.emit_headers);
        assert!(decision.tier.is_empty());
    }

    #[tokio::test]
    async fn test_evict_stale_reclaims_elapsed_counters() {
        let (engine, clock) = engine_with_mock_clock(TWO_TIER);
        let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::Authentication);

        engine.check(&request).await;
        assert_eq!(engine.counter_count(), 2);

        engine.evict_stale();
        assert_eq!(engine.counter_count(), 2);

        clock.advance(Duration::from_secs(61));
        engine.evict_stale();
        assert_eq!(engine.counter_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_counters() {
        let (engine, _clock) = engine_with_mock_clock(TWO_TIER);
        let request = RequestInfo::new(addr("10.0.0.1"), RouteClass::Authentication);

        engine.check(&request).await;
        assert!(engine.counter_count() > 0);

        engine.clear();
        assert_eq!(engine.counter_count(), 0);
    }
}
