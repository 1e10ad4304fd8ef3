//! Wire event types exchanged with requesters, mobile units and monitors.
//!
//! Every event serializes as `{"event": <name>, "data": <payload>}` with
//! camelCase names, so a transport can forward them as-is.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dispatch::UnitId;
use crate::geo::Coordinate;
use crate::monitor::MonitorId;

/// Category of a monitoring station.
///
/// Only [`MonitorClass::Police`] is configured today. Other tags survive
/// deserialization as [`MonitorClass::Other`] so that a registration with an
/// unsupported class can be ignored rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MonitorClass {
    /// Police station clearing a green corridor.
    Police,
    /// Any tag this build does not route.
    Other(String),
}

impl MonitorClass {
    /// Returns true if registrations of this class are routed.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Police)
    }

    /// The wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Police => "police",
            Self::Other(tag) => tag,
        }
    }
}

impl Default for MonitorClass {
    fn default() -> Self {
        Self::Police
    }
}

impl From<String> for MonitorClass {
    fn from(value: String) -> Self {
        if value == "police" {
            Self::Police
        } else {
            Self::Other(value)
        }
    }
}

impl From<MonitorClass> for String {
    fn from(value: MonitorClass) -> Self {
        match value {
            MonitorClass::Police => "police".to_string(),
            MonitorClass::Other(tag) => tag,
        }
    }
}

impl fmt::Display for MonitorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `registerMonitor` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMonitor {
    /// Monitor class tag (`"police"`).
    #[serde(rename = "type")]
    pub class: MonitorClass,
    /// Fixed location the client claims.
    pub location: Coordinate,
    /// Explicit monitor identifier; preferred over location matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_id: Option<MonitorId>,
}

/// `driverLocationUpdate` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// The reporting mobile unit.
    #[serde(rename = "driverId", alias = "unitId")]
    pub unit_id: UnitId,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl PositionUpdate {
    /// The reported position.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// `rideCompleted` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideCompleted {
    /// The unit whose ride ended.
    #[serde(rename = "driverId", alias = "unitId")]
    pub unit_id: UnitId,
}

/// Messages accepted by the gateway from a live connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundMessage {
    /// A monitoring station announces itself.
    RegisterMonitor(RegisterMonitor),
    /// A mobile unit reports its position.
    DriverLocationUpdate(PositionUpdate),
    /// A ride ended; the request leaves the registry.
    RideCompleted(RideCompleted),
}

impl InboundMessage {
    /// The wire event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegisterMonitor(_) => "registerMonitor",
            Self::DriverLocationUpdate(_) => "driverLocationUpdate",
            Self::RideCompleted(_) => "rideCompleted",
        }
    }
}

/// Kind tag carried by requester notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A unit was assigned and is on its way.
    Dispatched,
}

/// `notification` payload sent to the requester on dispatch.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchNotification {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub driver_id: UnitId,
    pub driver_position: Coordinate,
    pub user_destination: Coordinate,
}

/// Request details attached to a proximity alert.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub request_id: UnitId,
    pub user_location: Coordinate,
}

/// `ambulanceApproaching` payload sent to a monitor.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityAlert {
    pub message: String,
    pub ambulance_position: Coordinate,
    pub driver_id: UnitId,
    pub distance_km: f64,
    pub request_info: RequestInfo,
}

/// Events pushed to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundEvent {
    /// Requester: a unit was dispatched.
    Notification(DispatchNotification),
    /// Requester: live unit position.
    AmbulanceLocation(Coordinate),
    /// Monitor: a unit entered the alert radius.
    AmbulanceApproaching(ProximityAlert),
}

impl OutboundEvent {
    /// The wire event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::AmbulanceLocation(_) => "ambulanceLocation",
            Self::AmbulanceApproaching(_) => "ambulanceApproaching",
        }
    }
}
