//! Line-oriented JSON frames exchanged with TCP clients.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::error::{CorridorError, CorridorResult, TransportError};
use crate::events::{InboundMessage, OutboundEvent, PositionUpdate, RegisterMonitor, RideCompleted};
use crate::gateway::{DispatchReceipt, RideRequest};

/// Maximum size of a single frame, excluding the line terminator.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Bind this connection to a monitoring station.
    RegisterMonitor(RegisterMonitor),
    /// Position report from a unit.
    DriverLocationUpdate(PositionUpdate),
    /// A ride ended.
    RideCompleted(RideCompleted),
    /// Ask for an ambulance; answered with `requestAccepted` or `error`.
    RequestAmbulance(RideRequest),
}

/// Where a decoded client frame goes.
#[derive(Debug)]
pub enum Routed {
    /// Applied asynchronously by the gateway worker.
    Gateway(InboundMessage),
    /// Answered on the same connection.
    Ride(RideRequest),
}

impl ClientFrame {
    /// Splits gateway messages from ride requests.
    #[must_use]
    pub fn route(self) -> Routed {
        match self {
            Self::RegisterMonitor(m) => Routed::Gateway(InboundMessage::RegisterMonitor(m)),
            Self::DriverLocationUpdate(u) => Routed::Gateway(InboundMessage::DriverLocationUpdate(u)),
            Self::RideCompleted(c) => Routed::Gateway(InboundMessage::RideCompleted(c)),
            Self::RequestAmbulance(r) => Routed::Ride(r),
        }
    }
}

/// Transport-level replies that are not gateway events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ControlFrame {
    /// First frame on every connection.
    Connected {
        /// Id to quote as `userSocketId` in ride requests.
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
    },
    /// A ride request was accepted.
    RequestAccepted(DispatchReceipt),
    /// A frame was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ControlFrame {
    /// Error frame describing `err`.
    #[must_use]
    pub fn error(err: &CorridorError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

/// Frames the server writes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Event(OutboundEvent),
    Control(ControlFrame),
}

impl From<OutboundEvent> for ServerFrame {
    fn from(event: OutboundEvent) -> Self {
        Self::Event(event)
    }
}

impl From<ControlFrame> for ServerFrame {
    fn from(frame: ControlFrame) -> Self {
        Self::Control(frame)
    }
}

/// Parses one line (with or without its terminator) into a client frame.
pub fn decode_frame(line: &[u8]) -> CorridorResult<ClientFrame> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    if line.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            size: line.len(),
            max: MAX_FRAME_BYTES,
        }
        .into());
    }

    serde_json::from_slice(line).map_err(|e| {
        TransportError::DeserializationFailed {
            message: e.to_string(),
        }
        .into()
    })
}

/// Serializes a server frame as one newline-terminated line.
pub fn encode_frame(frame: &ServerFrame) -> CorridorResult<String> {
    let mut line = serde_json::to_string(frame).map_err(|e| TransportError::SerializationFailed {
        message: e.to_string(),
    })?;

    if line.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            size: line.len(),
            max: MAX_FRAME_BYTES,
        }
        .into());
    }

    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::dispatch::UnitId;
    use crate::geo::Coordinate;

    #[test]
    fn decodes_every_client_frame() {
        let lines = [
            r#"{"event":"registerMonitor","data":{"type":"police","location":{"lat":18.5303,"lng":73.8446}}}"#,
            r#"{"event":"driverLocationUpdate","data":{"driverId":"AMB-D001","lat":18.5,"lng":73.8}}"#,
            r#"{"event":"rideCompleted","data":{"driverId":"AMB-D001"}}"#,
            r#"{"event":"requestAmbulance","data":{"location":"Lat: 1, Lng: 2","condition":"","userSocketId":"x"}}"#,
        ];

        let routed: Vec<_> = lines
            .iter()
            .map(|l| decode_frame(l.as_bytes()).unwrap().route())
            .collect();
        assert!(matches!(routed[0], Routed::Gateway(InboundMessage::RegisterMonitor(_))));
        assert!(matches!(routed[1], Routed::Gateway(InboundMessage::DriverLocationUpdate(_))));
        assert!(matches!(routed[2], Routed::Gateway(InboundMessage::RideCompleted(_))));
        assert!(matches!(routed[3], Routed::Ride(_)));
    }

    #[test]
    fn decode_tolerates_crlf() {
        let frame = decode_frame(b"{\"event\":\"rideCompleted\",\"data\":{\"driverId\":\"A\"}}\r\n").unwrap();
        assert_eq!(
            frame,
            ClientFrame::RideCompleted(RideCompleted {
                unit_id: UnitId::from("A")
            })
        );
    }

    #[test]
    fn decode_rejects_garbage_and_oversized() {
        let err = decode_frame(b"not json").unwrap_err();
        assert!(err.is_transport());

        let err = decode_frame(br#"{"event":"launchRocket","data":{}}"#).unwrap_err();
        assert!(err.is_transport());

        let big = vec![b' '; MAX_FRAME_BYTES + 1];
        let err = decode_frame(&big).unwrap_err();
        assert!(matches!(
            err,
            CorridorError::Transport(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn control_frames_wire_shape() {
        let id = ConnectionId::new();
        let line = encode_frame(&ControlFrame::Connected { connection_id: id }.into()).unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value, json!({"event": "connected", "data": {"connectionId": id.to_string()}}));

        let err = CorridorError::internal("boom");
        let value = serde_json::to_value(ServerFrame::from(ControlFrame::error(&err))).unwrap();
        assert_eq!(value["event"], "error");
        assert!(value["data"]["message"].as_str().unwrap().contains("boom"));

        let value = serde_json::to_value(ServerFrame::from(ControlFrame::RequestAccepted(DispatchReceipt {
            message: "Request received and dispatched.".to_string(),
            driver_id: UnitId::from("AMB-D001"),
        })))
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "requestAccepted", "data": {"message": "Request received and dispatched.", "driverId": "AMB-D001"}})
        );
    }

    #[test]
    fn server_frames_parse_back_by_event_name() {
        let line = encode_frame(&OutboundEvent::AmbulanceLocation(Coordinate::new(1.5, 2.5)).into()).unwrap();
        let frame: ServerFrame = serde_json::from_str(&line).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Event(OutboundEvent::AmbulanceLocation(Coordinate::new(1.5, 2.5)))
        );
    }
}
