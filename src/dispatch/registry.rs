use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::info;

use crate::connection::ConnectionId;
use crate::error::{CorridorResult, ExecutionError};
use crate::geo::Coordinate;

use super::{DispatchRequest, UnitId};

/// In-memory directory of active dispatch requests.
#[derive(Debug, Default, Clone)]
pub struct RequestRegistry {
    requests: HashMap<UnitId, DispatchRequest>,
}

impl RequestRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new dispatched request.
    ///
    /// Fails with `DuplicateRequest` if the unit already has one; the
    /// existing request is left untouched.
    pub fn create(
        &mut self,
        unit_id: UnitId,
        requester: ConnectionId,
        origin: Coordinate,
        condition: impl Into<String>,
        initial_position: Coordinate,
    ) -> CorridorResult<&DispatchRequest> {
        if self.requests.contains_key(&unit_id) {
            return Err(ExecutionError::DuplicateRequest { unit_id }.into());
        }

        let request = DispatchRequest::new(unit_id.clone(), requester, origin, condition, initial_position);
        Ok(self.requests.entry(unit_id).or_insert(request))
    }

    /// Overwrites the unit's last known position.
    pub fn update_position(&mut self, unit_id: &UnitId, position: Coordinate) -> CorridorResult<&DispatchRequest> {
        let request = self
            .requests
            .get_mut(unit_id)
            .ok_or_else(|| ExecutionError::UnknownRequest {
                unit_id: unit_id.clone(),
            })?;

        request.last_position = position;
        request.updated_at = Utc::now();
        Ok(request)
    }

    #[must_use]
    pub fn get(&self, unit_id: &UnitId) -> Option<&DispatchRequest> {
        self.requests.get(unit_id)
    }

    /// Ends a ride and removes its request.
    pub fn complete(&mut self, unit_id: &UnitId) -> CorridorResult<DispatchRequest> {
        let request = self
            .requests
            .remove(unit_id)
            .ok_or_else(|| ExecutionError::UnknownRequest {
                unit_id: unit_id.clone(),
            })?;

        info!(unit = %unit_id, "dispatch request completed");
        Ok(request)
    }

    /// Removes requests with no position report for longer than `ttl`.
    ///
    /// Returns the removed unit ids, sorted.
    pub fn expire_idle(&mut self, now: DateTime<Utc>, ttl: ChronoDuration) -> Vec<UnitId> {
        let mut expired: Vec<UnitId> = self
            .requests
            .values()
            .filter(|r| now - r.updated_at > ttl)
            .map(|r| r.unit_id.clone())
            .collect();
        expired.sort();

        for unit_id in &expired {
            self.requests.remove(unit_id);
            info!(unit = %unit_id, "dispatch request expired");
        }
        expired
    }

    #[must_use]
    pub fn contains(&self, unit_id: &UnitId) -> bool {
        self.requests.contains_key(unit_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DispatchRequest> {
        self.requests.values()
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, unit_id: &UnitId) -> Option<&mut DispatchRequest> {
        self.requests.get_mut(unit_id)
    }
}
