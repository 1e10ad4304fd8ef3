//! Per-update evaluation: proximity alerts for monitors and live relay for
//! requesters.
//!
//! Both components are synchronous and side-effect only through the
//! [`ConnectionHub`](crate::connection::ConnectionHub) they are handed.

/// At-most-once proximity alerting.
pub mod proximity;
/// Requester-facing relay.
pub mod relay;

pub use proximity::{AlertRecord, ProximityEngine};
pub use relay::LiveRelay;
