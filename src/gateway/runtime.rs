//! Dedicated worker thread owning the [`Gateway`].
//!
//! Every caller talks to the gateway through one bounded command queue, so
//! commands from a connection are applied in the order they were submitted
//! and a registration can never overtake the disconnect that follows it.
//! Position updates and other inbound messages are enqueued with
//! `try_send` and refused with `QueueFull` under backpressure; connection
//! lifecycle and ride requests block until the worker answers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::{DispatchReceipt, Gateway, RideRequest, UpdateOutcome};
use crate::config::CorridorConfig;
use crate::connection::{ConnectionId, Delivery, EventStream};
use crate::dispatch::{DispatchRequest, UnitId};
use crate::error::{CorridorError, CorridorResult, ExecutionError};
use crate::events::InboundMessage;

const COMMAND_PATH: &str = "gateway_commands";

enum Command {
    Connect {
        reply: Sender<EventStream>,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Inbound {
        connection: ConnectionId,
        message: InboundMessage,
    },
    RequestAmbulance {
        ride: RideRequest,
        reply: Sender<CorridorResult<DispatchReceipt>>,
    },
    Complete {
        unit_id: UnitId,
        reply: Sender<CorridorResult<DispatchRequest>>,
    },
}

/// Counters maintained by the worker.
#[derive(Debug, Default)]
pub struct GatewayStats {
    rejected_commands: AtomicU64,
    failed_messages: AtomicU64,
    positions_relayed: AtomicU64,
    alerts_sent: AtomicU64,
    undelivered_events: AtomicU64,
    expired_requests: AtomicU64,
}

impl GatewayStats {
    /// Submissions refused because the command queue was full or closed.
    #[must_use]
    pub fn rejected_commands(&self) -> u64 {
        self.rejected_commands.load(Ordering::Relaxed)
    }

    /// Inbound messages the gateway rejected (unknown unit, bad coordinate...).
    #[must_use]
    pub fn failed_messages(&self) -> u64 {
        self.failed_messages.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn positions_relayed(&self) -> u64 {
        self.positions_relayed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent.load(Ordering::Relaxed)
    }

    /// Relay or alert sends that were backlogged or unreachable.
    #[must_use]
    pub fn undelivered_events(&self) -> u64 {
        self.undelivered_events.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn expired_requests(&self) -> u64 {
        self.expired_requests.load(Ordering::Relaxed)
    }

    fn record_update(&self, outcome: &UpdateOutcome) {
        if outcome.relay.is_delivered() {
            self.positions_relayed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.undelivered_events.fetch_add(1, Ordering::Relaxed);
        }

        for alert in &outcome.alerts {
            let counter = match alert.delivery {
                Delivery::Delivered => &self.alerts_sent,
                Delivery::Backlogged | Delivery::Unreachable => &self.undelivered_events,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Handle to the gateway worker thread.
#[derive(Debug)]
pub struct GatewayRuntime {
    command_tx: Sender<Command>,
    queue_capacity: usize,
    stats: Arc<GatewayStats>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connect { .. } => "Connect",
            Self::Disconnect { .. } => "Disconnect",
            Self::Inbound { .. } => "Inbound",
            Self::RequestAmbulance { .. } => "RequestAmbulance",
            Self::Complete { .. } => "Complete",
        };
        f.write_str(name)
    }
}

impl GatewayRuntime {
    /// Validates `config`, builds the gateway and spawns its worker.
    pub fn start(config: CorridorConfig) -> CorridorResult<Self> {
        let queue_capacity = config.runtime.command_queue_capacity.max(1);
        let sweep_interval = config.runtime.sweep_interval();
        let gateway = Gateway::new(config)?;

        let (command_tx, command_rx) = bounded::<Command>(queue_capacity);
        let stats = Arc::new(GatewayStats::default());

        let thread_stats = Arc::clone(&stats);
        let join = thread::Builder::new()
            .name("corridor-gateway".to_string())
            .spawn(move || worker_loop(gateway, &thread_stats, &command_rx, sweep_interval))
            .map_err(|e| CorridorError::internal(format!("failed to spawn gateway worker: {e}")))?;

        info!(queue_capacity, "gateway runtime started");

        Ok(Self {
            command_tx,
            queue_capacity,
            stats,
            join: Mutex::new(Some(join)),
        })
    }

    /// Opens a connection and returns its outbound stream.
    pub fn connect(&self) -> CorridorResult<EventStream> {
        let (reply, rx) = bounded(1);
        self.send(Command::Connect { reply })?;
        rx.recv().map_err(|_| disconnected())
    }

    /// Closes a connection. Idempotent.
    pub fn disconnect(&self, connection: ConnectionId) -> CorridorResult<()> {
        self.send(Command::Disconnect { connection })
    }

    /// Enqueues an inbound message without blocking.
    ///
    /// Processing errors are logged by the worker; only queue admission is
    /// reported here.
    pub fn submit(&self, connection: ConnectionId, message: InboundMessage) -> CorridorResult<()> {
        match self.command_tx.try_send(Command::Inbound { connection, message }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.rejected_commands.fetch_add(1, Ordering::Relaxed);
                Err(ExecutionError::QueueFull {
                    path: COMMAND_PATH.to_string(),
                    capacity: self.queue_capacity,
                }
                .into())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.rejected_commands.fetch_add(1, Ordering::Relaxed);
                Err(disconnected())
            }
        }
    }

    /// Accepts a ride request and waits for the assigned unit.
    pub fn request_ambulance(&self, ride: RideRequest) -> CorridorResult<DispatchReceipt> {
        let (reply, rx) = bounded(1);
        self.send(Command::RequestAmbulance { ride, reply })?;
        rx.recv().map_err(|_| disconnected())?
    }

    /// Ends a ride and returns its final state.
    pub fn complete(&self, unit_id: UnitId) -> CorridorResult<DispatchRequest> {
        let (reply, rx) = bounded(1);
        self.send(Command::Complete { unit_id, reply })?;
        rx.recv().map_err(|_| disconnected())?
    }

    #[must_use]
    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    fn send(&self, command: Command) -> CorridorResult<()> {
        self.command_tx.send(command).map_err(|_| disconnected())
    }
}

impl Drop for GatewayRuntime {
    fn drop(&mut self) {
        // Streams never hold the command sender, so closing ours lets the
        // worker drain the queue and exit.
        let (closed_tx, _) = bounded::<Command>(1);
        drop(std::mem::replace(&mut self.command_tx, closed_tx));

        if let Ok(mut guard) = self.join.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    warn!("gateway worker panicked");
                }
            }
        }
    }
}

fn disconnected() -> CorridorError {
    ExecutionError::Disconnected {
        path: COMMAND_PATH.to_string(),
    }
    .into()
}

fn worker_loop(
    mut gateway: Gateway,
    stats: &GatewayStats,
    command_rx: &Receiver<Command>,
    sweep_interval: std::time::Duration,
) {
    let mut last_sweep = Instant::now();

    loop {
        match command_rx.recv_timeout(sweep_interval) {
            Ok(command) => apply(&mut gateway, stats, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_sweep.elapsed() >= sweep_interval {
            last_sweep = Instant::now();
            let expired = gateway.expire_idle(Utc::now());
            stats
                .expired_requests
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
        }
    }

    debug!("gateway worker stopped");
}

fn apply(gateway: &mut Gateway, stats: &GatewayStats, command: Command) {
    match command {
        Command::Connect { reply } => {
            let _ = reply.send(gateway.connect());
        }
        Command::Disconnect { connection } => gateway.disconnect(connection),
        Command::Inbound { connection, message } => {
            let event = message.name();
            let result = match message {
                InboundMessage::DriverLocationUpdate(update) => gateway
                    .update_position(&update)
                    .map(|outcome| stats.record_update(&outcome)),
                other => gateway.handle(connection, other),
            };

            if let Err(err) = result {
                stats.failed_messages.fetch_add(1, Ordering::Relaxed);
                if err.is_validation() {
                    warn!(%connection, event, error = %err, "rejected inbound message");
                } else {
                    debug!(%connection, event, error = %err, "inbound message had no effect");
                }
            }
        }
        Command::RequestAmbulance { ride, reply } => {
            let result = gateway.request_ambulance(&ride);
            if let Err(err) = &result {
                debug!(error = %err, "ride request rejected");
            }
            let _ = reply.send(result);
        }
        Command::Complete { unit_id, reply } => {
            let _ = reply.send(gateway.complete(&unit_id));
        }
    }
}
