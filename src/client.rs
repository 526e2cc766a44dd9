//! Per-connection reader and writer tasks.
//!
//! DESIGN
//! ======
//! Each connection gets exactly two tasks. The reader is the only task that
//! receives from the socket; the writer is the only one that sends. They
//! share no state — the reader talks to the hub, the hub feeds the writer
//! through the client's bounded outbound queue.
//!
//! LIFECYCLE
//! =========
//! Either task exiting tears the client down. The reader signals unregister
//! to the hub on every exit path; the hub drops the outbound sender; the
//! writer sees the closed queue, sends a close frame, and exits. A writer
//! failure closes the sink, which surfaces as a transport error on the
//! reader's next receive — worst case one full read deadline later if the
//! peer has gone silent. Until then the client stays registered and its
//! queue keeps filling; overflow eviction caps that window.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::{Envelope, decode_client_message};
use crate::hub::HubHandle;

// =============================================================================
// TUNABLES
// =============================================================================

/// Time allowed for a single write to the peer.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Time allowed between inbound frames (pongs included) before the peer is
/// considered dead.
pub const READ_DEADLINE: Duration = Duration::from_secs(60);

/// Ping period. Must be less than `READ_DEADLINE` so the peer's own liveness
/// window is refreshed before it expires; 9/10 of the read deadline.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(READ_DEADLINE.as_secs() * 9 / 10);

/// Maximum accepted inbound frame size in bytes.
pub const MAX_FRAME_BYTES: usize = 512;

/// Capacity of the per-client outbound queue between hub and writer.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// READER
// =============================================================================

/// Pump inbound frames from the socket to the hub.
///
/// The read deadline is refreshed by any inbound traffic — data frames and
/// pong acknowledgments alike. Malformed frames are dropped and reading
/// continues; only a deadline, a transport error, or a close frame ends the
/// task. Unregistration is signalled on every exit path.
pub async fn read_pump(mut stream: SplitStream<WebSocket>, hub: HubHandle, token: Uuid, identity: String) {
    loop {
        let msg = match timeout(READ_DEADLINE, stream.next()).await {
            Err(_) => {
                info!(%token, identity, "read deadline exceeded, dropping client");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(%token, identity, error = %e, "transport error on read");
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(text) => match decode_client_message(text.as_str()) {
                Ok(message) => {
                    hub.broadcast(Envelope::user(identity.clone(), message)).await;
                }
                Err(e) => {
                    warn!(%token, identity, error = %e, "dropping malformed frame");
                }
            },
            Message::Close(_) => break,
            // Pongs (and any stray ping/binary) only refresh the deadline.
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    hub.unregister(token).await;
}

// =============================================================================
// WRITER
// =============================================================================

/// Pump envelopes from the outbound queue to the socket, interleaved with
/// heartbeat pings.
///
/// Queued envelopes already waiting when a write happens are coalesced into
/// the same text frame, newline-separated, in FIFO order. A closed queue is
/// the hub's termination signal: the writer sends a close frame and exits.
/// Any write failure or deadline overrun ends the task.
pub async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut outbound: mpsc::Receiver<Envelope>) {
    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            delivery = outbound.recv() => {
                let Some(envelope) = delivery else {
                    // The hub closed the queue.
                    let _ = write_frame(&mut sink, Message::Close(None)).await;
                    break;
                };
                let Some(frame) = coalesce_frame(envelope, &mut outbound) else {
                    break;
                };
                if write_frame(&mut sink, Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if write_frame(&mut sink, Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Serialize one envelope plus any backlog already sitting in the queue into
/// a single newline-delimited text frame. Order is preserved; nothing is
/// pulled that was not already available.
fn coalesce_frame(first: Envelope, outbound: &mut mpsc::Receiver<Envelope>) -> Option<String> {
    let mut frame = match serde_json::to_string(&first) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize envelope");
            return None;
        }
    };
    while let Ok(next) = outbound.try_recv() {
        match serde_json::to_string(&next) {
            Ok(json) => {
                frame.push('\n');
                frame.push_str(&json);
            }
            Err(e) => {
                warn!(error = %e, "failed to serialize envelope");
                return None;
            }
        }
    }
    Some(frame)
}

async fn write_frame(sink: &mut SplitSink<WebSocket, Message>, msg: Message) -> Result<(), ()> {
    match timeout(WRITE_DEADLINE, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "transport error on write");
            Err(())
        }
        Err(_) => {
            warn!("write deadline exceeded");
            Err(())
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
