//! Fixed monitoring stations.
//!
//! Monitors are loaded from configuration at start-up and never added or
//! removed afterwards. A monitor becomes alertable when its client registers
//! over the gateway and stops being alertable when that connection closes.

/// Monitor directory and connection binding.
pub mod registry;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::dispatch::UnitId;
use crate::events::MonitorClass;
use crate::geo::Coordinate;

pub use registry::MonitorRegistry;

/// Stable identifier of a monitoring station (e.g. `P_SHIVAJINAGAR`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(String);

impl MonitorId {
    /// Creates a monitor id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MonitorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of a monitor, as found in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSpec {
    /// Stable identifier.
    pub id: MonitorId,
    /// Display name used in logs.
    pub name: String,
    /// Category of recipient.
    #[serde(default)]
    pub class: MonitorClass,
    /// Fixed station location.
    pub location: Coordinate,
}

/// A monitoring station and its live state.
#[derive(Debug, Clone)]
pub struct Monitor {
    id: MonitorId,
    name: String,
    class: MonitorClass,
    location: Coordinate,
    connection: Option<ConnectionId>,
    notified: HashSet<UnitId>,
}

impl Monitor {
    /// Builds an unconnected monitor from its static description.
    #[must_use]
    pub fn from_spec(spec: MonitorSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            class: spec.class,
            location: spec.location,
            connection: None,
            notified: HashSet::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &MonitorId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn class(&self) -> &MonitorClass {
        &self.class
    }

    #[must_use]
    pub const fn location(&self) -> Coordinate {
        self.location
    }

    /// The live connection, if the monitor's client is registered.
    #[must_use]
    pub const fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns true if an alert for `unit` was already delivered here.
    #[must_use]
    pub fn has_notified(&self, unit: &UnitId) -> bool {
        self.notified.contains(unit)
    }

    /// Records that an alert for `unit` was delivered.
    ///
    /// Returns false if it was already recorded.
    pub fn mark_notified(&mut self, unit: UnitId) -> bool {
        self.notified.insert(unit)
    }

    /// Number of units this monitor has been alerted about.
    #[must_use]
    pub fn notified_count(&self) -> usize {
        self.notified.len()
    }

    pub(crate) fn bind(&mut self, connection: ConnectionId) {
        self.connection = Some(connection);
    }

    pub(crate) fn unbind(&mut self) {
        self.connection = None;
    }

    pub(crate) fn forget(&mut self, unit: &UnitId) -> bool {
        self.notified.remove(unit)
    }
}
