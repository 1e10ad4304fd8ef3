//! Active dispatch requests.
//!
//! A dispatch request links a requester's connection, the mobile unit sent
//! to them, and the unit's live position. Requests are keyed by the unit id.

/// Request directory.
pub mod registry;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::geo::Coordinate;

pub use registry::RequestRegistry;

/// Identifier of a mobile unit, which also identifies its dispatch request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a unit id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthetic id `<prefix><seq>` with the sequence zero-padded to three digits.
    ///
    /// ```
    /// use corridor::dispatch::UnitId;
    ///
    /// assert_eq!(UnitId::sequenced("AMB-D", 1).as_str(), "AMB-D001");
    /// assert_eq!(UnitId::sequenced("AMB-D", 1234).as_str(), "AMB-D1234");
    /// ```
    #[must_use]
    pub fn sequenced(prefix: &str, seq: u64) -> Self {
        Self(format!("{prefix}{seq:03}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracking state for one ride.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    /// The assigned mobile unit; also the request id.
    pub unit_id: UnitId,
    /// Connection that receives relay and dispatch events.
    pub requester: ConnectionId,
    /// Where the requester is waiting.
    pub origin: Coordinate,
    /// Free-text patient condition.
    pub condition: String,
    /// Last position reported by the unit.
    pub last_position: Coordinate,
    /// Whether the unit is on its way; proximity checks only run when set.
    pub dispatched: bool,
    /// When the request was accepted.
    pub created_at: DateTime<Utc>,
    /// When the position was last reported (or creation time).
    pub updated_at: DateTime<Utc>,
}

impl DispatchRequest {
    /// Creates a dispatched request positioned at `initial_position`.
    #[must_use]
    pub fn new(
        unit_id: UnitId,
        requester: ConnectionId,
        origin: Coordinate,
        condition: impl Into<String>,
        initial_position: Coordinate,
    ) -> Self {
        let now = Utc::now();
        Self {
            unit_id,
            requester,
            origin,
            condition: condition.into(),
            last_position: initial_position,
            dispatched: true,
            created_at: now,
            updated_at: now,
        }
    }
}
