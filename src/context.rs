//! Connection context shared by the command loop, the listener and handlers.
//!
//! Holds at most one attached extension transport plus the table of requests
//! awaiting a reply. Responses are matched to requests only by correlation id,
//! so any number of requests may be in flight and replies may arrive in any
//! order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::transport::{InboundResponse, RequestEnvelope, Transport};

/// Default deadline for a request when the caller does not pick one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity of one accepted connection. Increases with every attach.
pub type ConnectionId = u64;

/// Bookkeeping for a request awaiting its response.
struct PendingRequest {
    slot: oneshot::Sender<Result<Value, String>>,
    request_type: String,
    deadline: Instant,
}

struct Attached {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
}

#[derive(Default)]
struct TransportSlot {
    current: Option<Attached>,
    next_id: ConnectionId,
}

/// Owner of the active transport and the pending-request table.
pub struct ConnectionContext {
    slot: Mutex<TransportSlot>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    connected: watch::Sender<bool>,
    default_timeout: Duration,
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl ConnectionContext {
    pub fn new(default_timeout: Duration) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            slot: Mutex::new(TransportSlot::default()),
            pending: Mutex::new(HashMap::new()),
            connected,
            default_timeout,
        }
    }

    /// Whether an extension is currently attached.
    pub fn has_transport(&self) -> bool {
        *self.connected.borrow()
    }

    /// Attach a new transport, closing and replacing any existing one.
    ///
    /// Requests still pending on the old transport are left to their own
    /// deadlines.
    pub async fn attach(&self, transport: Arc<dyn Transport>) -> ConnectionId {
        let (id, old) = {
            let mut slot = self.slot.lock().await;
            slot.next_id += 1;
            let id = slot.next_id;
            let old = slot.current.replace(Attached { id, transport });
            self.connected.send_replace(true);
            (id, old)
        };
        // The old peer may have stopped reading; close it outside the lock.
        if let Some(old) = old {
            info!(connection = old.id, "New extension connection, closing previous one");
            old.transport.close().await;
        }
        info!(connection = id, "Browser extension connected");
        id
    }

    /// Clear the transport if `id` is still the attached connection.
    ///
    /// Returns `false` when `id` was already superseded.
    pub async fn detach(&self, id: ConnectionId) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.current.as_ref().is_some_and(|a| a.id == id) {
            slot.current = None;
            self.connected.send_replace(false);
            info!(connection = id, "Browser extension disconnected");
            true
        } else {
            debug!(connection = id, "Ignoring disconnect of superseded connection");
            false
        }
    }

    /// Wait until a transport is attached.
    pub async fn wait_for_transport(&self) {
        let mut rx = self.connected.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|connected| *connected).await;
    }

    /// Send a request using the context's default timeout.
    pub async fn request(
        &self,
        request_type: &str,
        payload: Option<Value>,
    ) -> Result<Value, RelayError> {
        self.send_request(request_type, payload, self.default_timeout)
            .await
    }

    /// Send a request to the extension and wait for its response.
    ///
    /// Fails immediately with `NotConnected` when nothing is attached. The
    /// pending entry is removed on every exit path.
    pub async fn send_request(
        &self,
        request_type: &str,
        payload: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RelayError> {
        let transport = {
            let slot = self.slot.lock().await;
            match slot.current.as_ref() {
                Some(attached) => Arc::clone(&attached.transport),
                None => return Err(RelayError::NotConnected),
            }
        };

        let envelope = RequestEnvelope::new(request_type, payload);
        let frame = serde_json::to_string(&envelope)
            .map_err(|e| RelayError::Transport(format!("failed to encode request: {e}")))?;
        let id = envelope.id;

        let deadline = Instant::now() + timeout;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id.clone(),
            PendingRequest {
                slot: tx,
                request_type: request_type.to_string(),
                deadline,
            },
        );

        debug!(id = %id, request_type, "Sending request");
        // The deadline covers the write too: a peer that stops reading
        // backs up the outbound queue.
        let outcome = match time::timeout_at(deadline, transport.send(frame)).await {
            Ok(Ok(())) => time::timeout_at(deadline, rx).await,
            Ok(Err(e)) => {
                self.pending.lock().await.remove(&id);
                warn!(id = %id, request_type, error = %e, "Failed to send request");
                return Err(e);
            }
            Err(elapsed) => Err(elapsed),
        };

        match outcome {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(RelayError::Remote(message)),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                Err(RelayError::Transport("response slot dropped".to_string()))
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                warn!(id = %id, request_type, ?timeout, "Request timed out");
                Err(RelayError::Timeout {
                    request_type: request_type.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Feed one inbound frame from the extension.
    ///
    /// Frames without a pending match (late, duplicate or unsolicited) are
    /// dropped silently.
    pub async fn ingest(&self, frame: &str) {
        let Some(response) = InboundResponse::parse(frame) else {
            debug!(frame = %truncate(frame, 100), "Ignoring frame without a correlation id");
            return;
        };

        let entry = self.pending.lock().await.remove(&response.request_id);
        match entry {
            Some(pending) => {
                if Instant::now() > pending.deadline {
                    debug!(id = %response.request_id, request_type = %pending.request_type, "Response arrived past deadline");
                }
                // The waiter may have given up already; nothing left to do then.
                let _ = pending.slot.send(response.outcome);
            }
            None => {
                debug!(id = %response.request_id, "Discarding response for unknown request");
            }
        }
    }

    /// Feed a frame received on connection `id`, dropping it if `id` has
    /// been superseded.
    pub async fn ingest_from(&self, id: ConnectionId, frame: &str) {
        let current = self.slot.lock().await.current.as_ref().map(|a| a.id);
        if current == Some(id) {
            self.ingest(frame).await;
        } else {
            debug!(connection = id, "Dropping frame from superseded connection");
        }
    }

    /// Close and clear the attached transport. Pending requests are left to
    /// time out.
    pub async fn close(&self) {
        let old = {
            let mut slot = self.slot.lock().await;
            let old = slot.current.take();
            self.connected.send_replace(false);
            old
        };
        if let Some(old) = old {
            old.transport.close().await;
            info!(connection = old.id, "Closed extension connection");
        }
    }

    /// Number of requests awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
