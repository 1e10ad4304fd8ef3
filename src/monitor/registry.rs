use tracing::{debug, info};

use crate::connection::ConnectionId;
use crate::dispatch::UnitId;
use crate::error::{CorridorResult, ExecutionError};
use crate::events::MonitorClass;
use crate::geo::Coordinate;

use super::{Monitor, MonitorId, MonitorSpec};

/// In-memory directory of monitors, kept in configuration order.
#[derive(Debug, Default, Clone)]
pub struct MonitorRegistry {
    monitors: Vec<Monitor>,
}

impl MonitorRegistry {
    /// Builds a registry of unconnected monitors.
    #[must_use]
    pub fn new(specs: impl IntoIterator<Item = MonitorSpec>) -> Self {
        Self {
            monitors: specs.into_iter().map(Monitor::from_spec).collect(),
        }
    }

    /// Binds `connection` to the monitor whose location equals `location`
    /// exactly and whose class is `class`.
    ///
    /// Silent no-op when nothing matches. Returns the bound monitor's id.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        class: &MonitorClass,
        location: Coordinate,
    ) -> Option<MonitorId> {
        #[allow(clippy::float_cmp)]
        let monitor = self
            .monitors
            .iter_mut()
            .find(|m| &m.class == class && m.location == location);

        let Some(monitor) = monitor else {
            debug!(%connection, lat = location.lat, lng = location.lng, "no monitor at registered location");
            return None;
        };

        monitor.bind(connection);
        info!(monitor = %monitor.id, name = %monitor.name, %connection, "monitor registered");
        Some(monitor.id.clone())
    }

    /// Binds `connection` to the monitor with the given id, provided its
    /// class is `class`.
    ///
    /// Returns whether the monitor was bound; a class mismatch is a silent
    /// no-op like an unmatched location.
    pub fn register_by_id(
        &mut self,
        connection: ConnectionId,
        class: &MonitorClass,
        id: &MonitorId,
    ) -> CorridorResult<bool> {
        let monitor = self
            .monitors
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| ExecutionError::UnknownMonitor {
                monitor_id: id.clone(),
            })?;

        if &monitor.class != class {
            debug!(monitor = %monitor.id, %class, %connection, "registration class does not match monitor");
            return Ok(false);
        }

        monitor.bind(connection);
        info!(monitor = %monitor.id, name = %monitor.name, %connection, "monitor registered");
        Ok(true)
    }

    /// Clears the connection of every monitor bound to `connection`.
    ///
    /// Idempotent. Returns the ids that were unbound.
    pub fn unregister(&mut self, connection: ConnectionId) -> Vec<MonitorId> {
        let mut unbound = Vec::new();
        for monitor in self
            .monitors
            .iter_mut()
            .filter(|m| m.connection == Some(connection))
        {
            monitor.unbind();
            info!(monitor = %monitor.id, name = %monitor.name, "monitor deregistered");
            unbound.push(monitor.id.clone());
        }
        unbound
    }

    /// Monitors with a live connection, in registry order.
    pub fn list_connected(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.iter().filter(|m| m.is_connected())
    }

    pub(crate) fn connected_mut(&mut self) -> impl Iterator<Item = &mut Monitor> {
        self.monitors.iter_mut().filter(|m| m.is_connected())
    }

    /// Removes `unit` from every monitor's notified set.
    pub fn forget_request(&mut self, unit: &UnitId) {
        for monitor in &mut self.monitors {
            monitor.forget(unit);
        }
    }

    /// Looks up a monitor by id.
    #[must_use]
    pub fn get(&self, id: &MonitorId) -> Option<&Monitor> {
        self.monitors.iter().find(|m| &m.id == id)
    }

    /// All monitors in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}
