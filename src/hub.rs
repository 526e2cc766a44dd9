//! Hub — the single coordinating task that owns the client registry.
//!
//! DESIGN
//! ======
//! The hub runs as one long-lived task for the lifetime of the process. All
//! registry mutations flow through its event loop: register, unregister, and
//! broadcast requests arrive on bounded channels and are processed one at a
//! time, so the registry needs no locks. Reader and writer tasks never touch
//! it directly.
//!
//! `join`/`leave` notifications are fanned out synchronously inside the loop,
//! immediately after the registry mutation that caused them — the hub already
//! owns the fan-out logic, so there is no reason to bounce the notification
//! back through its own broadcast channel.
//!
//! BACKPRESSURE
//! ============
//! Fan-out uses `try_send` against each client's bounded outbound queue. A
//! full queue means the consumer is too slow: that client is evicted on the
//! spot — removed from the registry, its queue closed by dropping the sender —
//! and a `leave` for it is fanned out to the survivors. The hub never blocks
//! on a slow consumer and never buffers unboundedly.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use uuid::Uuid;

use crate::envelope::Envelope;

/// Depth of the hub's own command channels. Callers enqueue and move on;
/// the loop is always available to drain them.
const COMMAND_QUEUE_DEPTH: usize = 64;

// =============================================================================
// TYPES
// =============================================================================

/// A live registry entry. The hub holds the only producer side of the
/// client's outbound queue; dropping it closes the queue and tells that
/// client's writer to shut down.
struct RegisteredClient {
    identity: String,
    outbound: mpsc::Sender<Envelope>,
}

struct RegisterRequest {
    token: Uuid,
    identity: String,
    outbound: mpsc::Sender<Envelope>,
}

enum HubEvent {
    Register(RegisterRequest),
    Unregister(Uuid),
    Broadcast(Envelope),
    Count(oneshot::Sender<usize>),
}

/// The hub task state. Created once, consumed by [`Hub::run`].
pub struct Hub {
    /// Registry keyed by per-connection token, not by caller-supplied
    /// identity: duplicate identities are accepted as independent entries.
    clients: HashMap<Uuid, RegisteredClient>,
    register_rx: mpsc::Receiver<RegisterRequest>,
    unregister_rx: mpsc::Receiver<Uuid>,
    broadcast_rx: mpsc::Receiver<Envelope>,
    count_rx: mpsc::Receiver<oneshot::Sender<usize>>,
}

/// Cloneable handle for submitting requests to the hub loop. All operations
/// enqueue and return; none of them wait for the loop to act.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<RegisterRequest>,
    unregister_tx: mpsc::Sender<Uuid>,
    broadcast_tx: mpsc::Sender<Envelope>,
    count_tx: mpsc::Sender<oneshot::Sender<usize>>,
}

// =============================================================================
// HUB
// =============================================================================

impl Hub {
    #[must_use]
    pub fn new() -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (unregister_tx, unregister_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (count_tx, count_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        let hub = Self { clients: HashMap::new(), register_rx, unregister_rx, broadcast_rx, count_rx };
        let handle = HubHandle { register_tx, unregister_tx, broadcast_tx, count_tx };
        (hub, handle)
    }

    /// Event loop. Processes exactly one event per iteration, fully, before
    /// considering the next. Exits only once every handle has been dropped.
    pub async fn run(mut self) {
        loop {
            let event = tokio::select! {
                Some(req) = self.register_rx.recv() => HubEvent::Register(req),
                Some(token) = self.unregister_rx.recv() => HubEvent::Unregister(token),
                Some(envelope) = self.broadcast_rx.recv() => HubEvent::Broadcast(envelope),
                Some(reply) = self.count_rx.recv() => HubEvent::Count(reply),
                else => break,
            };
            match event {
                HubEvent::Register(req) => self.handle_register(req),
                HubEvent::Unregister(token) => self.handle_unregister(token),
                HubEvent::Broadcast(envelope) => self.handle_broadcast(envelope),
                HubEvent::Count(reply) => {
                    let _ = reply.send(self.clients.len());
                }
            }
        }
        info!("hub loop stopped");
    }

    fn handle_register(&mut self, req: RegisterRequest) {
        let identity = req.identity.clone();
        self.clients.insert(req.token, RegisteredClient { identity: req.identity, outbound: req.outbound });
        info!(token = %req.token, identity, clients = self.clients.len(), "client registered");
        self.handle_broadcast(Envelope::join(identity));
    }

    /// Idempotent: a token already absent from the registry is a no-op, so
    /// the outbound queue is closed exactly once no matter how many
    /// unregister signals arrive.
    fn handle_unregister(&mut self, token: Uuid) {
        let Some(client) = self.clients.remove(&token) else {
            return;
        };
        let identity = client.identity.clone();
        info!(%token, identity, clients = self.clients.len(), "client unregistered");
        // Dropping the entry closes the outbound queue; the writer sees the
        // close and sends the peer a close frame.
        drop(client);
        self.handle_broadcast(Envelope::leave(identity));
    }

    fn handle_broadcast(&mut self, envelope: Envelope) {
        let mut evicted = self.fan_out(&envelope);
        // Evictions cascade: each evicted client produces a leave broadcast,
        // which can itself overflow another slow client's queue.
        while let Some((token, identity)) = evicted.pop() {
            warn!(%token, identity, "outbound queue full, evicting slow client");
            evicted.extend(self.fan_out(&Envelope::leave(identity)));
        }
    }

    /// Deliver one envelope to every registered client, including the sender.
    /// Returns the clients whose queues were full or gone; they have already
    /// been removed from the registry.
    fn fan_out(&mut self, envelope: &Envelope) -> Vec<(Uuid, String)> {
        let mut evicted = Vec::new();
        for (token, client) in &self.clients {
            match client.outbound.try_send(envelope.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                    evicted.push((*token, client.identity.clone()));
                }
            }
        }
        for (token, _) in &evicted {
            self.clients.remove(token);
        }
        evicted
    }
}

// =============================================================================
// HANDLE
// =============================================================================

impl HubHandle {
    /// Add a client to the registry. Returns the registry token used for
    /// unregistration. The hub schedules a `join` broadcast right after the
    /// insert; the caller is never blocked on that fan-out.
    pub async fn register(&self, identity: impl Into<String>, outbound: mpsc::Sender<Envelope>) -> Uuid {
        let token = Uuid::new_v4();
        let _ = self.register_tx.send(RegisterRequest { token, identity: identity.into(), outbound }).await;
        token
    }

    /// Remove a client from the registry. Safe to call more than once.
    pub async fn unregister(&self, token: Uuid) {
        let _ = self.unregister_tx.send(token).await;
    }

    /// Deliver an envelope to every currently registered client. May wait
    /// briefly for space on the hub's command channel, never on any client.
    pub async fn broadcast(&self, envelope: Envelope) {
        let _ = self.broadcast_tx.send(envelope).await;
    }

    /// Number of registered clients, as seen by the loop when it services
    /// the query. Used by tests and operational introspection.
    pub async fn client_count(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.count_tx.send(reply_tx).await.is_err() {
            return 0;
        }
        reply_rx.await.unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
