//! Error types for corridor.
//!
//! All errors in corridor are strongly typed using thiserror.
//! The gateway returns them; the runtime logs them and keeps the
//! live-tracking loop running.

use thiserror::Error;

use crate::dispatch::UnitId;
use crate::monitor::MonitorId;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Malformed location '{input}': {reason}")]
    MalformedLocation {
        input: String,
        reason: String,
    },

    #[error("Coordinate ({lat}, {lng}) is not finite")]
    NonFiniteCoordinate {
        lat: f64,
        lng: f64,
    },

    #[error("Invalid connection id '{value}'")]
    InvalidConnectionId {
        value: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    FieldTooLong {
        field: String,
        max_length: usize,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur while applying an accepted message.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Dispatch request already active for unit {unit_id}")]
    DuplicateRequest {
        unit_id: UnitId,
    },

    #[error("No active dispatch request for unit {unit_id}")]
    UnknownRequest {
        unit_id: UnitId,
    },

    #[error("Monitor not found: {monitor_id}")]
    UnknownMonitor {
        monitor_id: MonitorId,
    },

    #[error("Queue full on {path} (capacity {capacity})")]
    QueueFull {
        path: String,
        capacity: usize,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },
}

/// Transport errors for client-server communication.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
    },

    #[error("Failed to serialize frame: {message}")]
    SerializationFailed {
        message: String,
    },

    #[error("Failed to deserialize frame: {message}")]
    DeserializationFailed {
        message: String,
    },

    #[error("Frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        size: usize,
        max: usize,
    },
}

/// Top-level error type for corridor.
#[derive(Debug, Error)]
pub enum CorridorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl CorridorError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. } | ExecutionError::Timeout { .. }
            ),
            Self::Transport(e) => matches!(e, TransportError::ConnectionFailed { .. }),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for corridor operations.
pub type CorridorResult<T> = Result<T, CorridorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_location_message() {
        let err = ValidationError::MalformedLocation {
            input: "somewhere".to_string(),
            reason: "expected two fragments".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("somewhere"));
        assert!(msg.contains("two fragments"));
    }

    #[test]
    fn test_duplicate_request_names_unit() {
        let err = ExecutionError::DuplicateRequest {
            unit_id: UnitId::from("AMB-D001"),
        };
        assert!(format!("{err}").contains("AMB-D001"));
    }

    #[test]
    fn test_unknown_request_names_unit() {
        let err = ExecutionError::UnknownRequest {
            unit_id: UnitId::from("AMB-X"),
        };
        let msg = format!("{err}");
        assert!(msg.contains("No active dispatch request"));
        assert!(msg.contains("AMB-X"));
    }

    #[test]
    fn test_execution_error_timeout() {
        let err = ExecutionError::Timeout { duration_ms: 5000 };
        assert!(format!("{err}").contains("5000ms"));
    }

    #[test]
    fn test_corridor_error_from_validation() {
        let err: CorridorError = ValidationError::MissingField {
            field: "location".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_corridor_error_from_execution() {
        let err: CorridorError = ExecutionError::QueueFull {
            path: "gateway".to_string(),
            capacity: 8,
        }
        .into();
        assert!(err.is_execution());
        assert!(err.is_retryable());

        let err: CorridorError = ExecutionError::UnknownRequest {
            unit_id: UnitId::from("AMB-D001"),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_corridor_error_from_transport() {
        let err: CorridorError = TransportError::ConnectionFailed {
            message: "refused".to_string(),
        }
        .into();
        assert!(err.is_transport());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_corridor_error_internal() {
        let err = CorridorError::internal("worker gone");
        assert!(err.is_internal());
        assert!(!err.is_retryable());
        assert!(format!("{err}").contains("worker gone"));
    }
}
