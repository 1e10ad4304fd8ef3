//! Event gateway: routes connection events and inbound messages to the
//! registries, the live relay and the proximity engine.
//!
//! `Gateway` is a plain synchronous state machine. Each call runs to
//! completion before the next one starts; [`GatewayRuntime`] provides that
//! guarantee for concurrent callers by owning the gateway on one worker
//! thread.

/// Ride-request ingestion.
pub mod ingest;
/// Worker thread owning the gateway.
pub mod runtime;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::CorridorConfig;
use crate::connection::{ConnectionHub, ConnectionId, Delivery, EventStream};
use crate::dispatch::{DispatchRequest, RequestRegistry, UnitId};
use crate::engine::{AlertRecord, LiveRelay, ProximityEngine};
use crate::error::CorridorResult;
use crate::events::{InboundMessage, PositionUpdate, RegisterMonitor};
use crate::geo::Coordinate;
use crate::monitor::MonitorRegistry;

pub use ingest::{DispatchReceipt, RideRequest};
pub use runtime::{GatewayRuntime, GatewayStats};

/// What a single position update produced.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub relay: Delivery,
    pub alerts: Vec<AlertRecord>,
}

/// The message dispatch surface and the state it drives.
#[derive(Debug)]
pub struct Gateway {
    config: CorridorConfig,
    hub: ConnectionHub,
    monitors: MonitorRegistry,
    requests: RequestRegistry,
    engine: ProximityEngine,
    relay: LiveRelay,
    next_unit_seq: u64,
}

impl Gateway {
    /// Builds a gateway with fresh registries from a validated configuration.
    pub fn new(config: CorridorConfig) -> CorridorResult<Self> {
        config.validate()?;

        Ok(Self {
            hub: ConnectionHub::new(config.runtime.stream_capacity),
            monitors: MonitorRegistry::new(config.monitors.iter().cloned()),
            requests: RequestRegistry::new(),
            engine: ProximityEngine::new(config.alert_threshold_km),
            relay: LiveRelay::new(config.dispatch.eta_minutes),
            next_unit_seq: 1,
            config,
        })
    }

    /// Opens a connection for a requester, unit or monitor client.
    pub fn connect(&mut self) -> EventStream {
        let stream = self.hub.open();
        debug!(connection = %stream.connection_id(), "connection opened");
        stream
    }

    /// Handles a connection close: the connection's monitors become
    /// unreachable. Requests whose requester left stay active.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.hub.close(connection);
        self.monitors.unregister(connection);
        debug!(%connection, "connection closed");
    }

    /// Routes one inbound message from `connection`.
    pub fn handle(&mut self, connection: ConnectionId, message: InboundMessage) -> CorridorResult<()> {
        match message {
            InboundMessage::RegisterMonitor(registration) => self.register_monitor(connection, &registration),
            InboundMessage::DriverLocationUpdate(update) => self.update_position(&update).map(|_| ()),
            InboundMessage::RideCompleted(done) => self.complete(&done.unit_id).map(|_| ()),
        }
    }

    /// Binds a monitor to `connection`.
    ///
    /// Unsupported classes and unmatched locations are ignored.
    pub fn register_monitor(&mut self, connection: ConnectionId, registration: &RegisterMonitor) -> CorridorResult<()> {
        if !registration.class.is_supported() {
            debug!(%connection, class = %registration.class, "ignoring unsupported monitor class");
            return Ok(());
        }

        match &registration.monitor_id {
            Some(id) => {
                self.monitors.register_by_id(connection, &registration.class, id)?;
                Ok(())
            }
            None => {
                registration.location.validate()?;
                self.monitors.register(connection, &registration.class, registration.location);
                Ok(())
            }
        }
    }

    /// Records a unit's position, relays it to the requester and runs the
    /// proximity check.
    pub fn update_position(&mut self, update: &PositionUpdate) -> CorridorResult<UpdateOutcome> {
        let position = update.coordinate();
        position.validate()?;

        let request = self.requests.update_position(&update.unit_id, position)?;
        let relay = self.relay.relay_position(&self.hub, request);
        let alerts = self.engine.evaluate(&mut self.monitors, request, &self.hub);

        Ok(UpdateOutcome { relay, alerts })
    }

    /// Registers a request for an explicitly chosen unit and notifies the
    /// requester.
    pub fn create_request(
        &mut self,
        unit_id: UnitId,
        requester: ConnectionId,
        origin: Coordinate,
        condition: impl Into<String>,
        initial_position: Coordinate,
    ) -> CorridorResult<&DispatchRequest> {
        origin.validate()?;
        initial_position.validate()?;

        let request = self
            .requests
            .create(unit_id, requester, origin, condition, initial_position)?;
        self.relay.notify_dispatch(&self.hub, request);
        info!(unit = %request.unit_id, %requester, "dispatch request created");
        Ok(request)
    }

    /// Ends a ride and forgets which monitors were alerted for it.
    pub fn complete(&mut self, unit_id: &UnitId) -> CorridorResult<DispatchRequest> {
        let request = self.requests.complete(unit_id)?;
        self.monitors.forget_request(unit_id);
        Ok(request)
    }

    /// Drops requests idle past the configured TTL. No-op without a TTL.
    pub fn expire_idle(&mut self, now: DateTime<Utc>) -> Vec<UnitId> {
        let Some(ttl) = self.config.dispatch.request_ttl() else {
            return Vec::new();
        };

        let expired = self.requests.expire_idle(now, ttl);
        for unit_id in &expired {
            self.monitors.forget_request(unit_id);
        }
        expired
    }

    /// Allocates the next synthetic unit id not currently in use.
    pub(crate) fn allocate_unit_id(&mut self) -> UnitId {
        loop {
            let candidate = UnitId::sequenced(&self.config.dispatch.unit_id_prefix, self.next_unit_seq);
            self.next_unit_seq += 1;
            if !self.requests.contains(&candidate) {
                return candidate;
            }
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CorridorConfig {
        &self.config
    }

    #[must_use]
    pub const fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    #[must_use]
    pub const fn requests(&self) -> &RequestRegistry {
        &self.requests
    }

    #[must_use]
    pub const fn connections(&self) -> &ConnectionHub {
        &self.hub
    }

    #[cfg(test)]
    pub(crate) fn requests_mut(&mut self) -> &mut RequestRegistry {
        &mut self.requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CorridorError, ExecutionError, ValidationError};
    use crate::events::{MonitorClass, OutboundEvent, RideCompleted};
    use crate::monitor::MonitorId;

    const STATION: Coordinate = Coordinate::new(18.5303, 73.8446);
    const ORIGIN: Coordinate = Coordinate::new(18.5204, 73.8567);

    fn gateway() -> Gateway {
        Gateway::new(CorridorConfig::default()).unwrap()
    }

    fn register_police(gw: &mut Gateway, conn: ConnectionId, location: Coordinate) {
        gw.handle(
            conn,
            InboundMessage::RegisterMonitor(RegisterMonitor {
                class: MonitorClass::Police,
                location,
                monitor_id: None,
            }),
        )
        .unwrap();
    }

    fn move_unit(gw: &mut Gateway, unit: &str, lat: f64, lng: f64) -> CorridorResult<()> {
        gw.handle(
            ConnectionId::new(),
            InboundMessage::DriverLocationUpdate(PositionUpdate {
                unit_id: UnitId::from(unit),
                lat,
                lng,
            }),
        )
    }

    fn count_alerts(events: &[OutboundEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, OutboundEvent::AmbulanceApproaching(_)))
            .count()
    }

    #[test]
    fn approach_scenario_alerts_exactly_once() {
        let mut gw = gateway();
        let police = gw.connect();
        let user = gw.connect();
        register_police(&mut gw, police.connection_id(), STATION);

        let start = gw.config().dispatch.start_position;
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", start)
            .unwrap();

        move_unit(&mut gw, "AMB-D001", 18.55, 73.90).unwrap();
        assert_eq!(count_alerts(&police.drain()), 0);

        move_unit(&mut gw, "AMB-D001", 18.532, 73.845).unwrap();
        assert_eq!(count_alerts(&police.drain()), 1);

        move_unit(&mut gw, "AMB-D001", 18.532, 73.845).unwrap();
        assert_eq!(count_alerts(&police.drain()), 0);

        let relayed: Vec<_> = user
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                OutboundEvent::AmbulanceLocation(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(
            relayed,
            vec![
                Coordinate::new(18.55, 73.90),
                Coordinate::new(18.532, 73.845),
                Coordinate::new(18.532, 73.845),
            ]
        );
    }

    #[test]
    fn unknown_unit_update_is_an_error_without_side_effects() {
        let mut gw = gateway();
        let police = gw.connect();
        register_police(&mut gw, police.connection_id(), STATION);

        let err = move_unit(&mut gw, "AMB-NOPE", 18.5303, 73.8446).unwrap_err();
        assert!(matches!(
            err,
            CorridorError::Execution(ExecutionError::UnknownRequest { .. })
        ));
        assert!(police.drain().is_empty());
    }

    #[test]
    fn registration_at_unknown_location_is_noop() {
        let mut gw = gateway();
        let conn = gw.connect();
        register_police(&mut gw, conn.connection_id(), Coordinate::new(18.0, 73.0));
        assert_eq!(gw.monitors().list_connected().count(), 0);
    }

    #[test]
    fn registration_by_id_and_unsupported_class() {
        let mut gw = gateway();
        let conn = gw.connect().connection_id();

        gw.register_monitor(
            conn,
            &RegisterMonitor {
                class: MonitorClass::Other("fire".to_string()),
                location: STATION,
                monitor_id: Some(MonitorId::from("P_SHIVAJINAGAR")),
            },
        )
        .unwrap();
        assert_eq!(gw.monitors().list_connected().count(), 0);

        gw.register_monitor(
            conn,
            &RegisterMonitor {
                class: MonitorClass::Police,
                location: Coordinate::new(0.0, 0.0),
                monitor_id: Some(MonitorId::from("P_SHIVAJINAGAR")),
            },
        )
        .unwrap();
        assert_eq!(gw.monitors().list_connected().count(), 1);
    }

    #[test]
    fn disconnect_stops_alerts() {
        let mut gw = gateway();
        let police = gw.connect();
        let user = gw.connect();
        register_police(&mut gw, police.connection_id(), STATION);
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap();

        gw.disconnect(police.connection_id());
        move_unit(&mut gw, "AMB-D001", 18.5303, 73.8446).unwrap();
        assert_eq!(count_alerts(&police.drain()), 0);
        assert!(gw.monitors().iter().all(|m| !m.has_notified(&UnitId::from("AMB-D001"))));
    }

    #[test]
    fn non_finite_update_is_rejected() {
        let mut gw = gateway();
        let user = gw.connect();
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap();

        let err = move_unit(&mut gw, "AMB-D001", f64::NAN, 73.0).unwrap_err();
        assert!(matches!(
            err,
            CorridorError::Validation(ValidationError::NonFiniteCoordinate { .. })
        ));
        assert_eq!(gw.requests().get(&UnitId::from("AMB-D001")).unwrap().last_position, ORIGIN);
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let mut gw = gateway();
        let user = gw.connect();
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap();
        let err = gw
            .create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap_err();
        assert!(matches!(
            err,
            CorridorError::Execution(ExecutionError::DuplicateRequest { .. })
        ));
        // Only the first creation notified the requester.
        assert_eq!(user.drain().len(), 1);
    }

    #[test]
    fn completion_purges_notified_state() {
        let mut gw = gateway();
        let police = gw.connect();
        let user = gw.connect();
        register_police(&mut gw, police.connection_id(), STATION);
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", STATION)
            .unwrap();
        move_unit(&mut gw, "AMB-D001", 18.532, 73.845).unwrap();
        assert!(gw.monitors().iter().any(|m| m.has_notified(&UnitId::from("AMB-D001"))));

        gw.handle(
            user.connection_id(),
            InboundMessage::RideCompleted(RideCompleted {
                unit_id: UnitId::from("AMB-D001"),
            }),
        )
        .unwrap();
        assert!(gw.requests().is_empty());
        assert!(gw.monitors().iter().all(|m| m.notified_count() == 0));
        assert!(move_unit(&mut gw, "AMB-D001", 18.532, 73.845).is_err());
    }

    #[test]
    fn expire_idle_follows_configured_ttl() {
        let mut gw = gateway();
        let user = gw.connect();
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap();

        assert!(gw.expire_idle(Utc::now()).is_empty());

        let stale = Utc::now() - chrono::Duration::hours(7);
        gw.requests_mut().get_mut(&UnitId::from("AMB-D001")).unwrap().updated_at = stale;
        assert_eq!(gw.expire_idle(Utc::now()), vec![UnitId::from("AMB-D001")]);

        let mut config = CorridorConfig::default();
        config.dispatch.request_ttl_secs = None;
        let mut gw = Gateway::new(config).unwrap();
        let user = gw.connect();
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap();
        gw.requests_mut().get_mut(&UnitId::from("AMB-D001")).unwrap().updated_at = stale;
        assert!(gw.expire_idle(Utc::now()).is_empty());
    }

    #[test]
    fn allocate_unit_id_skips_active_ids() {
        let mut gw = gateway();
        let user = gw.connect();
        gw.create_request(UnitId::from("AMB-D001"), user.connection_id(), ORIGIN, "", ORIGIN)
            .unwrap();

        assert_eq!(gw.allocate_unit_id(), UnitId::from("AMB-D002"));
        assert_eq!(gw.allocate_unit_id(), UnitId::from("AMB-D003"));
    }
}
