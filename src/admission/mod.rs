//! Admission control logic and state management.

mod backend;
mod gate;
mod key;
mod store;
mod tiers;
mod window;

pub use backend::AdmissionBackend;
pub use gate::{AdmissionControl, Decision};
pub use key::{ClientKey, KeySelector, RequestInfo, RouteClass};
pub use store::{CounterKey, CounterStore};
pub use tiers::{PolicyTier, TierRegistry};
pub use window::{WindowOutcome, WindowState, WindowStrategy};
