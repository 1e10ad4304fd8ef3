//! Live connections and outbound delivery.
//!
//! The hub owns the sending half of every open connection. Each connection
//! is read through an [`EventStream`]. Sends never block: a full buffer or a
//! closed stream is reported back as a [`Delivery`] so callers decide what
//! an undelivered event means.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CorridorError, CorridorResult, ExecutionError, ValidationError};
use crate::events::OutboundEvent;

/// Unique identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new random connection id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConnectionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > 64 {
            return Err(ValidationError::InvalidConnectionId {
                value: s.chars().take(64).collect(),
            });
        }
        s.trim()
            .parse::<Uuid>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidConnectionId { value: s.to_string() })
    }
}

/// Outcome of a single outbound send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the connection's stream.
    Delivered,
    /// The stream buffer is full; the event was dropped.
    Backlogged,
    /// The connection is closed or was never opened.
    Unreachable,
}

impl Delivery {
    /// Returns true if the event reached the connection's buffer.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Receiving half of a connection.
#[derive(Debug)]
pub struct EventStream {
    connection_id: ConnectionId,
    rx: Receiver<OutboundEvent>,
}

impl EventStream {
    /// The connection this stream belongs to.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> CorridorResult<OutboundEvent> {
        self.rx.recv().map_err(|_| {
            CorridorError::Execution(ExecutionError::Disconnected {
                path: "event_stream".to_string(),
            })
        })
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> CorridorResult<OutboundEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => CorridorError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => CorridorError::Execution(ExecutionError::Disconnected {
                path: "event_stream".to_string(),
            }),
        })
    }

    /// Receive an event if one is already queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<OutboundEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take every event currently queued.
    #[must_use]
    pub fn drain(&self) -> Vec<OutboundEvent> {
        self.rx.try_iter().collect()
    }
}

/// Registry of open connections.
#[derive(Debug)]
pub struct ConnectionHub {
    stream_capacity: usize,
    senders: HashMap<ConnectionId, Sender<OutboundEvent>>,
}

impl ConnectionHub {
    /// Create an empty hub whose streams buffer up to `stream_capacity` events.
    #[must_use]
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            stream_capacity: stream_capacity.max(1),
            senders: HashMap::new(),
        }
    }

    /// Open a connection and return its stream.
    pub fn open(&mut self) -> EventStream {
        let connection_id = ConnectionId::new();
        let (tx, rx) = bounded::<OutboundEvent>(self.stream_capacity);
        self.senders.insert(connection_id, tx);
        EventStream { connection_id, rx }
    }

    /// Close a connection. Idempotent.
    ///
    /// Returns true if the connection was open.
    pub fn close(&mut self, connection: ConnectionId) -> bool {
        self.senders.remove(&connection).is_some()
    }

    /// Returns true if the connection has been opened and not closed.
    ///
    /// A stream dropped without [`ConnectionHub::close`] still counts as
    /// open; sends to it report [`Delivery::Unreachable`].
    #[must_use]
    pub fn is_open(&self, connection: ConnectionId) -> bool {
        self.senders.contains_key(&connection)
    }

    /// Number of open connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Returns true if no connection is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Best-effort, non-blocking send.
    pub fn send(&self, connection: ConnectionId, event: OutboundEvent) -> Delivery {
        let Some(tx) = self.senders.get(&connection) else {
            return Delivery::Unreachable;
        };

        match tx.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Backlogged,
            Err(TrySendError::Disconnected(_)) => Delivery::Unreachable,
        }
    }
}
