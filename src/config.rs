//! Configuration for the gateway and its runtime.
//!
//! Every field has a default matching the single-station deployment, so an
//! empty JSON object is a valid configuration file.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::proximity::DEFAULT_THRESHOLD_KM;
use crate::engine::relay::DEFAULT_ETA_MINUTES;
use crate::error::{CorridorError, CorridorResult, ValidationError};
use crate::events::MonitorClass;
use crate::geo::Coordinate;
use crate::monitor::{MonitorId, MonitorSpec};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorridorConfig {
    /// Alert radius shared by every monitor, in kilometres.
    pub alert_threshold_km: f64,
    /// Monitoring stations, in evaluation order.
    pub monitors: Vec<MonitorSpec>,
    /// Ride-request defaults.
    pub dispatch: DispatchConfig,
    /// Worker and buffer sizing.
    pub runtime: RuntimeConfig,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            alert_threshold_km: DEFAULT_THRESHOLD_KM,
            monitors: vec![MonitorSpec {
                id: MonitorId::from("P_SHIVAJINAGAR"),
                name: "Shivajinagar Police Station".to_string(),
                class: MonitorClass::Police,
                location: Coordinate::new(18.5303, 73.8446),
            }],
            dispatch: DispatchConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Defaults applied when a ride request is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Prefix of synthetic unit ids.
    pub unit_id_prefix: String,
    /// Where a newly assigned unit starts.
    pub start_position: Coordinate,
    /// ETA quoted to the requester.
    pub eta_minutes: u32,
    /// Idle time after which a request is dropped. `None` keeps requests
    /// until completed.
    pub request_ttl_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            unit_id_prefix: "AMB-D".to_string(),
            start_position: Coordinate::new(18.5375, 73.8825),
            eta_minutes: DEFAULT_ETA_MINUTES,
            request_ttl_secs: Some(6 * 60 * 60),
        }
    }
}

impl DispatchConfig {
    /// The request TTL as a chrono duration.
    #[must_use]
    pub fn request_ttl(&self) -> Option<chrono::Duration> {
        self.request_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
    }
}

/// Gateway runtime sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Max queued gateway commands before submissions are refused.
    pub command_queue_capacity: usize,
    /// Per-connection outbound buffer.
    pub stream_capacity: usize,
    /// How often idle requests are swept.
    pub sweep_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_capacity: 4096,
            stream_capacity: 256,
            sweep_interval_ms: 1000,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl CorridorConfig {
    /// Loads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> CorridorResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            CorridorError::from(ValidationError::InvalidConfig {
                reason: format!("cannot read {}: {e}", path.display()),
            })
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> CorridorResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("invalid JSON: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidConfig { reason };

        if !self.alert_threshold_km.is_finite() || self.alert_threshold_km <= 0.0 {
            return Err(invalid(format!(
                "alert_threshold_km must be positive, got {}",
                self.alert_threshold_km
            )));
        }

        let mut seen = HashSet::new();
        for monitor in &self.monitors {
            if monitor.id.as_str().trim().is_empty() {
                return Err(invalid("monitor id cannot be empty".to_string()));
            }
            if !seen.insert(&monitor.id) {
                return Err(invalid(format!("duplicate monitor id {}", monitor.id)));
            }
            if !monitor.location.is_finite() {
                return Err(invalid(format!("monitor {} has a non-finite location", monitor.id)));
            }
        }

        if self.dispatch.unit_id_prefix.trim().is_empty() {
            return Err(invalid("dispatch.unit_id_prefix cannot be empty".to_string()));
        }
        if !self.dispatch.start_position.is_finite() {
            return Err(invalid("dispatch.start_position must be finite".to_string()));
        }
        if let Some(secs) = self.dispatch.request_ttl_secs {
            if self.dispatch.request_ttl().is_none() {
                return Err(invalid(format!("dispatch.request_ttl_secs {secs} is out of range")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_describe_single_station() {
        let config = CorridorConfig::default();
        assert_eq!(config.alert_threshold_km, 2.0);
        assert_eq!(config.monitors.len(), 1);
        assert_eq!(config.monitors[0].id, MonitorId::from("P_SHIVAJINAGAR"));
        assert_eq!(config.monitors[0].location, Coordinate::new(18.5303, 73.8446));
        assert_eq!(config.dispatch.unit_id_prefix, "AMB-D");
        assert_eq!(config.dispatch.start_position, Coordinate::new(18.5375, 73.8825));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = CorridorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CorridorConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = CorridorConfig::from_json_str(
            r#"{
                "alert_threshold_km": 0.5,
                "monitors": [
                    {"id": "P_1", "name": "One", "location": {"lat": 1.0, "lng": 2.0}},
                    {"id": "F_1", "name": "Fire", "class": "fire", "location": {"lat": 3.0, "lng": 4.0}}
                ],
                "dispatch": {"eta_minutes": 7, "request_ttl_secs": null},
                "runtime": {"stream_capacity": 4}
            }"#,
        )
        .unwrap();

        assert_eq!(config.alert_threshold_km, 0.5);
        assert_eq!(config.monitors[0].class, MonitorClass::Police);
        assert_eq!(config.monitors[1].class, MonitorClass::Other("fire".to_string()));
        assert_eq!(config.dispatch.eta_minutes, 7);
        assert_eq!(config.dispatch.unit_id_prefix, "AMB-D");
        assert!(config.dispatch.request_ttl().is_none());
        assert_eq!(config.runtime.stream_capacity, 4);
        assert_eq!(config.runtime.command_queue_capacity, 4096);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = CorridorConfig::default();
        config.alert_threshold_km = 0.0;
        assert!(config.validate().is_err());

        let mut config = CorridorConfig::default();
        config.monitors.push(config.monitors[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate monitor id"));

        let mut config = CorridorConfig::default();
        config.monitors[0].location = Coordinate::new(f64::NAN, 0.0);
        assert!(config.validate().is_err());

        let mut config = CorridorConfig::default();
        config.dispatch.unit_id_prefix = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn request_ttl_beyond_duration_range_is_rejected() {
        let err = CorridorConfig::from_json_str(r#"{"dispatch": {"request_ttl_secs": 10000000000000000}}"#)
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("request_ttl_secs"));

        let mut config = CorridorConfig::default();
        config.dispatch.request_ttl_secs = Some(u64::MAX);
        assert!(config.validate().is_err());
        assert!(config.dispatch.request_ttl().is_none());

        config.dispatch.request_ttl_secs = Some(u64::try_from(i64::MAX / 1000).unwrap());
        assert!(config.validate().is_ok());
        assert!(config.dispatch.request_ttl().is_some());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"alert_threshold_km": 3.5}}"#).unwrap();

        let config = CorridorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.alert_threshold_km, 3.5);
    }

    #[test]
    fn missing_file_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = CorridorConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_validation());
    }
}
