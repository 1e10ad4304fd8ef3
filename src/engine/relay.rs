use tracing::debug;

use crate::connection::{ConnectionHub, Delivery};
use crate::dispatch::{DispatchRequest, UnitId};
use crate::events::{DispatchNotification, NotificationKind, OutboundEvent};

/// Default ETA quoted in dispatch notifications, in minutes.
pub const DEFAULT_ETA_MINUTES: u32 = 15;

/// Sends requester-facing events: the dispatch notice and live positions.
///
/// Sends are fire-and-forget; the returned [`Delivery`] is only logged here
/// and left to the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRelay {
    eta_minutes: u32,
}

impl Default for LiveRelay {
    fn default() -> Self {
        Self::new(DEFAULT_ETA_MINUTES)
    }
}

impl LiveRelay {
    #[must_use]
    pub const fn new(eta_minutes: u32) -> Self {
        Self { eta_minutes }
    }

    /// Forwards the unit's last position to the requester, unchanged.
    pub fn relay_position(&self, hub: &ConnectionHub, request: &DispatchRequest) -> Delivery {
        let delivery = hub.send(
            request.requester,
            OutboundEvent::AmbulanceLocation(request.last_position),
        );
        if !delivery.is_delivered() {
            debug!(unit = %request.unit_id, requester = %request.requester, ?delivery, "position relay not delivered");
        }
        delivery
    }

    /// Tells the requester which unit was assigned and where it starts.
    pub fn notify_dispatch(&self, hub: &ConnectionHub, request: &DispatchRequest) -> Delivery {
        let notification = DispatchNotification {
            message: self.dispatch_message(&request.unit_id),
            kind: NotificationKind::Dispatched,
            driver_id: request.unit_id.clone(),
            driver_position: request.last_position,
            user_destination: request.origin,
        };

        let delivery = hub.send(request.requester, OutboundEvent::Notification(notification));
        if !delivery.is_delivered() {
            debug!(unit = %request.unit_id, requester = %request.requester, ?delivery, "dispatch notification not delivered");
        }
        delivery
    }

    #[must_use]
    pub fn dispatch_message(&self, unit: &UnitId) -> String {
        format!("Ambulance {unit} dispatched! ETA ~{} min.", self.eta_minutes)
    }
}
