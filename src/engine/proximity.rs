use tracing::{debug, info, warn};

use crate::connection::{ConnectionHub, Delivery};
use crate::dispatch::{DispatchRequest, UnitId};
use crate::events::{OutboundEvent, ProximityAlert, RequestInfo};
use crate::monitor::{MonitorId, MonitorRegistry};

/// Default alert radius in kilometres.
pub const DEFAULT_THRESHOLD_KM: f64 = 2.0;

/// One alert attempt made during an evaluation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub monitor_id: MonitorId,
    pub unit_id: UnitId,
    pub distance_km: f64,
    pub delivery: Delivery,
}

/// Fires one alert per `(monitor, unit)` pair when a unit comes within the
/// threshold of a connected monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityEngine {
    threshold_km: f64,
}

impl Default for ProximityEngine {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_KM)
    }
}

impl ProximityEngine {
    #[must_use]
    pub const fn new(threshold_km: f64) -> Self {
        Self { threshold_km }
    }

    #[must_use]
    pub const fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// Evaluates the request's current position against every connected
    /// monitor, in registry order.
    ///
    /// A pair is recorded as notified only once the alert is accepted by the
    /// monitor's connection. A monitor whose connection turns out to be gone
    /// is unbound; a backlogged alert is dropped and retried on a later
    /// update.
    pub fn evaluate(
        &self,
        monitors: &mut MonitorRegistry,
        request: &DispatchRequest,
        hub: &ConnectionHub,
    ) -> Vec<AlertRecord> {
        let mut records = Vec::new();
        if !request.dispatched {
            return records;
        }

        let unit = &request.unit_id;
        let position = request.last_position;

        for monitor in monitors.connected_mut() {
            if monitor.has_notified(unit) {
                continue;
            }

            let distance_km = position.distance_km(&monitor.location());
            // NaN never satisfies the comparison.
            if !(distance_km <= self.threshold_km) {
                continue;
            }

            let Some(connection) = monitor.connection() else {
                continue;
            };

            let alert = ProximityAlert {
                message: alert_message(unit, distance_km),
                ambulance_position: position,
                driver_id: unit.clone(),
                distance_km,
                request_info: RequestInfo {
                    request_id: unit.clone(),
                    user_location: request.origin,
                },
            };

            let delivery = hub.send(connection, OutboundEvent::AmbulanceApproaching(alert));
            match delivery {
                Delivery::Delivered => {
                    monitor.mark_notified(unit.clone());
                    info!(
                        monitor = %monitor.id(),
                        name = monitor.name(),
                        unit = %unit,
                        distance_km = %format!("{distance_km:.2}"),
                        "proximity alert sent"
                    );
                }
                Delivery::Backlogged => {
                    warn!(monitor = %monitor.id(), unit = %unit, "monitor stream full, alert dropped");
                }
                Delivery::Unreachable => {
                    monitor.unbind();
                    debug!(monitor = %monitor.id(), unit = %unit, "monitor connection gone, unbinding");
                }
            }

            records.push(AlertRecord {
                monitor_id: monitor.id().clone(),
                unit_id: unit.clone(),
                distance_km,
                delivery,
            });
        }

        records
    }
}

/// Human-readable alert text with the distance rounded to two decimals.
#[must_use]
pub fn alert_message(unit: &UnitId, distance_km: f64) -> String {
    format!("URGENT! Ambulance {unit} is {distance_km:.2} km away from your area, requiring a green corridor!")
}
