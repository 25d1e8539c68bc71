//! Client key derivation and route classification.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Classification of a request's target route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Authentication endpoints (login, token refresh, invitations)
    Authentication,
    /// Everything else under the API surface
    GeneralApi,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteClass::Authentication => write!(f, "auth"),
            RouteClass::GeneralApi => write!(f, "api"),
        }
    }
}

/// The identifying attributes of an inbound request.
///
/// This is the only request shape the engine sees; routing, bodies and
/// headers stay with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Resolved client address, if the transport could provide one.
    pub remote_addr: Option<IpAddr>,
    /// Which class of route the request targets.
    pub route: RouteClass,
}

impl RequestInfo {
    /// Create a request descriptor with a known client address.
    pub fn new(remote_addr: IpAddr, route: RouteClass) -> Self {
        Self {
            remote_addr: Some(remote_addr),
            route,
        }
    }

    /// Create a request descriptor for a client whose address could not be
    /// resolved.
    pub fn anonymous(route: RouteClass) -> Self {
        Self {
            remote_addr: None,
            route,
        }
    }
}

/// How a tier derives its counter key from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySelector {
    /// One counter per client address.
    Address,
    /// One counter per (client address, route class) pair.
    AddressAndRoute,
    /// A single counter shared by every caller of the tier.
    Shared,
}

impl KeySelector {
    /// Derive the counter key for a request.
    ///
    /// A request without a resolvable address falls back to the shared
    /// anonymous bucket rather than failing: a misconfigured proxy must not
    /// let callers bypass throttling, and must not turn into a request error
    /// either.
    pub fn extract(&self, request: &RequestInfo) -> ClientKey {
        match (self, request.remote_addr) {
            (KeySelector::Shared, _) | (_, None) => ClientKey::Shared,
            (KeySelector::Address, Some(addr)) => ClientKey::Address(addr),
            (KeySelector::AddressAndRoute, Some(addr)) => {
                ClientKey::AddressAndRoute(addr, request.route)
            }
        }
    }
}

/// A key that partitions rate limit counters per distinct caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientKey {
    /// Keyed by client address.
    Address(IpAddr),
    /// Keyed by client address and route class.
    AddressAndRoute(IpAddr, RouteClass),
    /// The shared anonymous bucket.
    Shared,
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKey::Address(addr) => write!(f, "{}", addr),
            ClientKey::AddressAndRoute(addr, route) => write!(f, "{}/{}", addr, route),
            ClientKey::Shared => write!(f, "shared"),
        }
    }
}
