//! Turnstile - Tiered Request Admission Control
//!
//! This crate implements the admission-control layer of an HTTP API: a set
//! of tiered fixed/sliding-window rate limiters with per-client counters,
//! key extraction, and standardized 429 payload/header semantics. The engine
//! is framework-agnostic; it consumes a request descriptor and a clock and
//! produces an admit/reject decision plus header metadata, leaving routing
//! and response writing to the caller.
//!
//! ```no_run
//! use std::net::IpAddr;
//! use turnstile::admission::{AdmissionControl, RequestInfo, RouteClass};
//! use turnstile::config::AdmissionConfig;
//! use turnstile::headers;
//!
//! # async fn handle(remote_addr: IpAddr) -> turnstile::error::Result<()> {
//! let engine = AdmissionControl::from_config(AdmissionConfig::default())?;
//!
//! let request = RequestInfo::new(remote_addr, RouteClass::GeneralApi);
//! let decision = engine.check(&request).await;
//! if !decision.admitted {
//!     let _status = 429;
//!     let _body = headers::rejection_body(&decision);
//!     let _headers = headers::quota_headers(&decision);
//! }
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod headers;
