//! Policy tiers and the tier registry.
//!
//! Tiers are validated once at registry construction and immutable from then
//! on. A request may be subject to several tiers at once (a global tier plus
//! a stricter route-specific tier); the registry hands them out broadest
//! scope first.

use std::collections::HashSet;
use std::time::Duration;

use tracing::info;

use crate::config::{AdmissionConfig, TierConfig, TierScope};
use crate::error::{AdmissionError, Result};

use super::key::{KeySelector, RouteClass};
use super::window::WindowStrategy;

/// An immutable, validated rate-limiting policy tier.
#[derive(Debug, Clone)]
pub struct PolicyTier {
    /// Unique tier name.
    pub name: String,
    /// Which requests the tier applies to.
    pub scope: TierScope,
    /// Size of the counting window.
    pub window: Duration,
    /// Admitted requests per window per key.
    pub max_requests: u32,
    /// Counting strategy.
    pub strategy: WindowStrategy,
    /// How the counter key is derived from a request.
    pub key_selector: KeySelector,
    /// Payload returned to rejected callers.
    pub message: String,
    /// Whether quota headers are emitted for this tier.
    pub emit_headers: bool,
}

impl PolicyTier {
    fn from_config(config: TierConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(AdmissionError::Config("tier name must not be empty".to_string()));
        }
        if config.window_secs == 0 {
            return Err(AdmissionError::Config(format!(
                "tier '{}': window_secs must be positive",
                config.name
            )));
        }
        if config.max_requests == 0 {
            return Err(AdmissionError::Config(format!(
                "tier '{}': max_requests must be positive",
                config.name
            )));
        }

        Ok(Self {
            name: config.name,
            scope: config.scope,
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            strategy: config.strategy,
            key_selector: config.key_by,
            message: config.message,
            emit_headers: config.headers,
        })
    }

    /// Whether this tier applies to the given route.
    pub fn applies_to(&self, route: RouteClass) -> bool {
        self.scope.applies_to(route)
    }
}

/// Static lookup from route classification to the applicable policy tiers.
#[derive(Debug)]
pub struct TierRegistry {
    /// All tiers, global scopes first; config order is preserved within each
    /// group.
    tiers: Vec<PolicyTier>,
}

impl TierRegistry {
    /// Build a registry from configuration, validating every tier.
    pub fn new(config: AdmissionConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        for tier in &config.tiers {
            if !seen.insert(tier.name.clone()) {
                return Err(AdmissionError::Config(format!(
                    "duplicate tier name '{}'",
                    tier.name
                )));
            }
        }

        let mut tiers = config
            .tiers
            .into_iter()
            .map(PolicyTier::from_config)
            .collect::<Result<Vec<_>>>()?;
        tiers.sort_by_key(|tier| !tier.scope.is_global());

        info!(tier_count = tiers.len(), "Loaded admission tiers");

        Ok(Self { tiers })
    }

    /// Build a registry with the built-in default tier table.
    pub fn with_defaults() -> Self {
        Self::new(AdmissionConfig::default()).expect("default admission config is valid")
    }

    /// The tiers applicable to a route, broadest scope first.
    pub fn tiers_for(&self, route: RouteClass) -> impl Iterator<Item = &PolicyTier> {
        self.tiers.iter().filter(move |tier| tier.applies_to(route))
    }

    /// Look up a tier by name.
    pub fn get(&self, name: &str) -> Option<&PolicyTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    /// Number of configured tiers.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Whether the registry has no tiers (admission disabled).
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}
