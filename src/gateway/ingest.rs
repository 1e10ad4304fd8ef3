use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Gateway;
use crate::connection::ConnectionId;
use crate::dispatch::UnitId;
use crate::error::{CorridorResult, ValidationError};
use crate::geo::Coordinate;

/// Longest accepted free-text condition.
pub const MAX_CONDITION_LEN: usize = 1024;

/// Confirmation text returned for every accepted ride request.
pub const ACCEPTED_MESSAGE: &str = "Request received and dispatched.";

/// A requester asking for an ambulance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    /// Pickup location as `"Lat: <f>, Lng: <f>"`.
    pub location: String,
    /// Free-text patient condition.
    #[serde(default)]
    pub condition: String,
    /// Connection that receives the dispatch notification and live positions.
    #[serde(rename = "userSocketId", default)]
    pub user_socket_id: String,
}

/// Acknowledgement for an accepted ride request.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReceipt {
    pub message: String,
    pub driver_id: UnitId,
}

impl Gateway {
    /// Validates a ride request, assigns a unit and notifies the requester.
    ///
    /// The assigned unit starts at the configured start position. Nothing is
    /// registered when any field is rejected.
    pub fn request_ambulance(&mut self, ride: &RideRequest) -> CorridorResult<DispatchReceipt> {
        let origin = Coordinate::parse_labeled(&ride.location)?;
        if ride.user_socket_id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "userSocketId".to_string(),
            }
            .into());
        }
        let requester: ConnectionId = ride.user_socket_id.parse()?;
        if ride.condition.len() > MAX_CONDITION_LEN {
            return Err(ValidationError::FieldTooLong {
                field: "condition".to_string(),
                max_length: MAX_CONDITION_LEN,
            }
            .into());
        }

        let unit_id = self.allocate_unit_id();
        let start = self.config().dispatch.start_position;
        let request = self.create_request(unit_id, requester, origin, ride.condition.as_str(), start)?;
        debug!(unit = %request.unit_id, origin = %request.origin, "ride request accepted");

        Ok(DispatchReceipt {
            message: ACCEPTED_MESSAGE.to_string(),
            driver_id: request.unit_id.clone(),
        })
    }
}
