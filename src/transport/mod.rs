//! NDJSON-over-TCP transport for the gateway.
//!
//! Each TCP connection maps to one gateway connection. The first frame the
//! server writes is `connected`, carrying the id a requester quotes as
//! `userSocketId`. Every later line in either direction is one JSON frame
//! (see [`frame`]).
//!
//! The gateway runtime is synchronous, so blocking calls are bridged with
//! `spawn_blocking` and outbound events are pumped from the connection's
//! [`EventStream`] into a tokio channel drained by a writer task.

/// Frame types and codec.
pub mod frame;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionId, EventStream};
use crate::error::{CorridorError, CorridorResult, ExecutionError, TransportError};
use crate::gateway::{GatewayRuntime, RideRequest};

pub use frame::{decode_frame, encode_frame, ClientFrame, ControlFrame, Routed, ServerFrame, MAX_FRAME_BYTES};

/// Outbound frames buffered per connection before the forwarder waits.
const OUTBOUND_BUFFER: usize = 128;

/// How often an idle forwarder checks whether the client went away.
const FORWARD_POLL: Duration = Duration::from_millis(500);

/// Accepts clients until `shutdown` resolves.
pub async fn serve<F>(runtime: Arc<GatewayRuntime>, listener: TcpListener, shutdown: F) -> CorridorResult<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("transport shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    let runtime = Arc::clone(&runtime);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(runtime, socket, peer).await {
                            debug!(%peer, error = %err, "connection ended with error");
                        }
                    });
                }
                Err(err) => warn!(error = %err, "accept failed"),
            },
        }
    }
}

async fn handle_connection(runtime: Arc<GatewayRuntime>, socket: TcpStream, peer: SocketAddr) -> CorridorResult<()> {
    let stream = blocking(&runtime, |rt| rt.connect()).await?;
    let connection = stream.connection_id();
    info!(%peer, %connection, "client connected");

    let (reader, writer) = socket.into_split();
    let (out_tx, out_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);

    // Buffer is empty, so this cannot wait; it is queued ahead of any event.
    out_tx
        .send(ControlFrame::Connected { connection_id: connection }.into())
        .await
        .map_err(|_| closed())?;

    let forward_tx = out_tx.clone();
    let forwarder = tokio::task::spawn_blocking(move || forward_events(&stream, &forward_tx));
    let writer = tokio::spawn(write_frames(writer, out_rx));

    let result = read_frames(&runtime, connection, BufReader::new(reader), &out_tx).await;

    // Closing the gateway connection ends the forwarder; dropping the last
    // sender then lets the writer flush and exit.
    if let Err(err) = blocking(&runtime, move |rt| rt.disconnect(connection)).await {
        warn!(%connection, error = %err, "failed to close gateway connection");
    }
    let _ = forwarder.await;
    drop(out_tx);
    let _ = writer.await;

    info!(%peer, %connection, "client disconnected");
    result
}

async fn read_frames<R>(
    runtime: &Arc<GatewayRuntime>,
    connection: ConnectionId,
    mut reader: R,
    out_tx: &mpsc::Sender<ServerFrame>,
) -> CorridorResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(1024);

    loop {
        let reply = match read_line_bounded(&mut reader, &mut buf).await.map_err(io_error)? {
            LineRead::Eof => return Ok(()),
            LineRead::Oversized(size) => Some(ControlFrame::error(&CorridorError::from(
                TransportError::FrameTooLarge {
                    size,
                    max: MAX_FRAME_BYTES,
                },
            ))),
            LineRead::Line if buf.iter().all(u8::is_ascii_whitespace) => None,
            LineRead::Line => match decode_frame(&buf) {
                Ok(frame) => dispatch_frame(runtime, connection, frame).await,
                Err(err) => {
                    debug!(%connection, error = %err, "undecodable frame");
                    Some(ControlFrame::error(&err))
                }
            },
        };

        if let Some(reply) = reply {
            out_tx.send(reply.into()).await.map_err(|_| closed())?;
        }
    }
}

async fn dispatch_frame(
    runtime: &Arc<GatewayRuntime>,
    connection: ConnectionId,
    frame: ClientFrame,
) -> Option<ControlFrame> {
    match frame.route() {
        Routed::Gateway(message) => runtime.submit(connection, message).err().map(|err| {
            warn!(%connection, error = %err, "inbound message refused");
            ControlFrame::error(&err)
        }),
        Routed::Ride(ride) => Some(request_ambulance(runtime, ride).await),
    }
}

async fn request_ambulance(runtime: &Arc<GatewayRuntime>, ride: RideRequest) -> ControlFrame {
    match blocking(runtime, move |rt| rt.request_ambulance(ride)).await {
        Ok(receipt) => ControlFrame::RequestAccepted(receipt),
        Err(err) => ControlFrame::error(&err),
    }
}

fn forward_events(stream: &EventStream, tx: &mpsc::Sender<ServerFrame>) {
    loop {
        match stream.recv_timeout(FORWARD_POLL) {
            Ok(event) => {
                if tx.blocking_send(event.into()).is_err() {
                    break;
                }
            }
            Err(CorridorError::Execution(ExecutionError::Timeout { .. })) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

async fn write_frames(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<ServerFrame>) -> CorridorResult<()> {
    while let Some(frame) = rx.recv().await {
        let line = match encode_frame(&frame) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "dropping unencodable frame");
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await.map_err(io_error)?;
    }

    let _ = writer.shutdown().await;
    Ok(())
}

enum LineRead {
    Eof,
    Line,
    Oversized(usize),
}

/// Reads one line into `buf` without buffering more than a frame's worth.
/// An oversized line is consumed and discarded.
async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_FRAME_BYTES as u64 + 2;

    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() == Some(&b'\n') || (n as u64) < limit {
        return Ok(LineRead::Line);
    }

    let mut size = n;
    loop {
        buf.clear();
        let m = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        size += m;
        if m == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(LineRead::Oversized(size))
}

async fn blocking<T, F>(runtime: &Arc<GatewayRuntime>, f: F) -> CorridorResult<T>
where
    T: Send + 'static,
    F: FnOnce(&GatewayRuntime) -> CorridorResult<T> + Send + 'static,
{
    let runtime = Arc::clone(runtime);
    tokio::task::spawn_blocking(move || f(&runtime))
        .await
        .map_err(|e| CorridorError::internal(format!("blocking task failed: {e}")))?
}

fn io_error(err: io::Error) -> CorridorError {
    TransportError::ConnectionFailed {
        message: err.to_string(),
    }
    .into()
}

fn closed() -> CorridorError {
    TransportError::ConnectionFailed {
        message: "outbound channel closed".to_string(),
    }
    .into()
}
