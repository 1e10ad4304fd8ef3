//! # Corridor - green-corridor alerting for ambulance dispatch
//!
//! Corridor tracks dispatched ambulances in real time. Requesters receive a
//! dispatch notice and a live feed of their unit's position; fixed
//! monitoring stations (police posts) receive a single urgent alert the
//! first time a unit comes within the alert radius, so they can clear a
//! path ahead of it.
//!
//! ## Core Concepts
//!
//! - **Monitor**: a fixed station that binds to a live connection
//! - **Dispatch request**: a requester paired with a mobile unit
//! - **Proximity engine**: at-most-once alerting per (monitor, unit) pair
//! - **Gateway**: routes connection events and inbound messages
//!
//! ## Usage
//!
//! ```rust
//! use corridor::config::CorridorConfig;
//! use corridor::dispatch::UnitId;
//! use corridor::events::{InboundMessage, PositionUpdate};
//! use corridor::gateway::{Gateway, RideRequest};
//!
//! let mut gateway = Gateway::new(CorridorConfig::default())?;
//! let requester = gateway.connect();
//!
//! let receipt = gateway.request_ambulance(&RideRequest {
//!     location: "Lat: 18.5204, Lng: 73.8567".to_string(),
//!     condition: "unconscious".to_string(),
//!     user_socket_id: requester.connection_id().to_string(),
//! })?;
//! assert_eq!(receipt.driver_id, UnitId::from("AMB-D001"));
//!
//! gateway.handle(
//!     requester.connection_id(),
//!     InboundMessage::DriverLocationUpdate(PositionUpdate {
//!         unit_id: receipt.driver_id,
//!         lat: 18.532,
//!         lng: 73.845,
//!     }),
//! )?;
//! assert_eq!(requester.drain().len(), 2);
//! # Ok::<(), corridor::CorridorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod geo;

// Registries and evaluation
pub mod dispatch;
pub mod engine;
pub mod gateway;
pub mod monitor;

// Server mode
#[cfg(feature = "server")]
pub mod logging;
#[cfg(feature = "transport-tcp")]
pub mod transport;

// Re-export primary types at crate root for convenience
pub use config::CorridorConfig;
pub use connection::{ConnectionHub, ConnectionId, Delivery, EventStream};
pub use dispatch::{DispatchRequest, RequestRegistry, UnitId};
pub use engine::{AlertRecord, LiveRelay, ProximityEngine};
pub use error::{CorridorError, CorridorResult, ExecutionError, TransportError, ValidationError};
pub use events::{InboundMessage, MonitorClass, OutboundEvent};
pub use gateway::{DispatchReceipt, Gateway, GatewayRuntime, RideRequest};
pub use geo::{haversine_km, Coordinate};
pub use monitor::{Monitor, MonitorId, MonitorRegistry, MonitorSpec};
