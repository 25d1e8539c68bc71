//! Tier table configuration.
//!
//! The tier table is the only externally configured shape in the engine. It
//! is loaded once at process start (from YAML or the built-in defaults),
//! validated into a [`TierRegistry`](crate::admission::TierRegistry), and
//! never mutated afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::admission::{KeySelector, RouteClass, WindowStrategy};
use crate::error::{AdmissionError, Result};

/// Which requests a tier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierScope {
    /// Every request, regardless of route.
    Global,
    /// Authentication routes only.
    Authentication,
    /// General API routes only.
    GeneralApi,
}

impl TierScope {
    /// Whether a tier with this scope applies to the given route.
    pub fn applies_to(&self, route: RouteClass) -> bool {
        match self {
            TierScope::Global => true,
            TierScope::Authentication => route == RouteClass::Authentication,
            TierScope::GeneralApi => route == RouteClass::GeneralApi,
        }
    }

    /// Whether this scope covers all routes.
    pub fn is_global(&self) -> bool {
        matches!(self, TierScope::Global)
    }
}

/// Configuration for a single policy tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Unique tier name, used in counter keys and log fields.
    pub name: String,
    /// Which requests the tier applies to.
    pub scope: TierScope,
    /// Size of the counting window, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Admitted requests per window per key.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Counting strategy for the tier.
    #[serde(default)]
    pub strategy: WindowStrategy,
    /// How the counter key is derived from a request.
    #[serde(default = "default_key_by")]
    pub key_by: KeySelector,
    /// Payload returned to rejected callers.
    #[serde(default = "default_message")]
    pub message: String,
    /// Whether to emit quota headers for this tier.
    #[serde(default = "default_headers")]
    pub headers: bool,
}

/// The complete admission configuration: an ordered list of tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Policy tiers, evaluated broadest scope first.
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierConfig {
                    name: "global".to_string(),
                    scope: TierScope::Global,
                    window_secs: 60,
                    max_requests: 300,
                    strategy: WindowStrategy::Fixed,
                    key_by: KeySelector::Address,
                    message: default_message(),
                    headers: true,
                },
                TierConfig {
                    name: "auth".to_string(),
                    scope: TierScope::Authentication,
                    window_secs: 60,
                    max_requests: 10,
                    strategy: WindowStrategy::Sliding,
                    key_by: KeySelector::Address,
                    message: "Too many authentication attempts, please try again later."
                        .to_string(),
                    headers: true,
                },
                TierConfig {
                    name: "api".to_string(),
                    scope: TierScope::GeneralApi,
                    window_secs: 60,
                    max_requests: 100,
                    strategy: WindowStrategy::Fixed,
                    key_by: KeySelector::Address,
                    message: default_message(),
                    headers: true,
                },
            ],
        }
    }
}

impl AdmissionConfig {
    /// Create an empty configuration with no tiers (admission disabled).
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading admission configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AdmissionError::Config(format!("Failed to parse admission config: {}", e)))
    }
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    100
}

fn default_key_by() -> KeySelector {
    KeySelector::Address
}

fn default_message() -> String {
    "Too many requests, please try again later.".to_string()
}

fn default_headers() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_three_tiers() {
        let config = AdmissionConfig::default();
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.tiers[0].name, "global");
        assert_eq!(config.tiers[0].max_requests, 300);
        assert_eq!(config.tiers[1].name, "auth");
        assert_eq!(config.tiers[1].max_requests, 10);
        assert_eq!(config.tiers[2].name, "api");
        assert_eq!(config.tiers[2].max_requests, 100);
    }

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
tiers:
  - name: global
    scope: global
    window_secs: 60
    max_requests: 300
"#;
        let config = AdmissionConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.tiers.len(), 1);
        assert_eq!(config.tiers[0].name, "global");
        assert_eq!(config.tiers[0].scope, TierScope::Global);
        assert_eq!(config.tiers[0].max_requests, 300);
    }

    #[test]
    fn test_parse_applies_field_defaults() {
        let yaml = r#"
tiers:
  - name: auth
    scope: authentication
"#;
        let config = AdmissionConfig::from_yaml(yaml).unwrap();
        let tier = &config.tiers[0];
        assert_eq!(tier.window_secs, 60);
        assert_eq!(tier.max_requests, 100);
        assert_eq!(tier.strategy, WindowStrategy::Fixed);
        assert_eq!(tier.key_by, KeySelector::Address);
        assert!(tier.headers);
    }

    #[test]
    fn test_parse_full_tier() {
        let yaml = r#"
tiers:
  - name: auth
    scope: authentication
    window_secs: 900
    max_requests: 5
    strategy: sliding
    key_by: address_and_route
    message: "Slow down."
    headers: false
"#;
        let config = AdmissionConfig::from_yaml(yaml).unwrap();
        let tier = &config.tiers[0];
        assert_eq!(tier.window_secs, 900);
        assert_eq!(tier.max_requests, 5);
        assert_eq!(tier.strategy, WindowStrategy::Sliding);
        assert_eq!(tier.key_by, KeySelector::AddressAndRoute);
        assert_eq!(tier.message, "Slow down.");
        assert!(!tier.headers);
    }

    #[test]
    fn test_parse_invalid_yaml_is_config_error() {
        let result = AdmissionConfig::from_yaml("tiers: {not: [a, list}");
        assert!(matches!(result, Err(AdmissionError::Config(_))));
    }

    #[test]
    fn test_scope_matching() {
        assert!(TierScope::Global.applies_to(RouteClass::Authentication));
        assert!(TierScope::Global.applies_to(RouteClass::GeneralApi));
        assert!(TierScope::Authentication.applies_to(RouteClass::Authentication));
        assert!(!TierScope::Authentication.applies_to(RouteClass::GeneralApi));
        assert!(TierScope::GeneralApi.applies_to(RouteClass::GeneralApi));
        assert!(!TierScope::GeneralApi.applies_to(RouteClass::Authentication));
    }
}
