//! Transport layer for relay ↔ extension communication.
//!
//! Provides the `Transport` trait used by the connection context and the
//! WebSocket implementation the listener hands out for each accepted peer.

pub mod protocol;
pub mod websocket;

pub use protocol::{InboundResponse, RequestEnvelope};
pub use websocket::WebSocketTransport;

use async_trait::async_trait;

use crate::error::RelayError;

/// Outbound half of a connection to the extension.
///
/// Inbound frames are not read through this trait: whoever owns the socket's
/// read half forwards them to `ConnectionContext::ingest_from`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one text frame for delivery.
    async fn send(&self, frame: String) -> Result<(), RelayError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport used by unit tests.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use super::Transport;
    use crate::context::ConnectionContext;
    use crate::error::RelayError;

    /// Records sent frames on a channel so a test can play the extension.
    pub struct FakeTransport {
        sent: mpsc::UnboundedSender<String>,
        closed: AtomicBool,
        fail_sends: bool,
    }

    impl FakeTransport {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    sent: tx,
                    closed: AtomicBool::new(false),
                    fail_sends: false,
                },
                rx,
            )
        }

        /// A transport whose every send fails.
        pub fn broken() -> Self {
            let (mut transport, _rx) = Self::new();
            transport.fail_sends = true;
            transport
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, frame: String) -> Result<(), RelayError> {
            if self.fail_sends || self.is_closed() {
                return Err(RelayError::Transport("connection closed".to_string()));
            }
            self.sent
                .send(frame)
                .map_err(|_| RelayError::Transport("peer gone".to_string()))
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Queue frames until `send` blocks. Returns how many were accepted.
    pub async fn fill_queue(transport: &impl Transport) -> usize {
        let mut queued = 0;
        while tokio::time::timeout(
            Duration::from_millis(20),
            transport.send(format!("frame {queued}")),
        )
        .await
        .is_ok()
        {
            queued += 1;
        }
        queued
    }

    /// A transport whose writes never complete.
    pub struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn send(&self, _frame: String) -> Result<(), RelayError> {
            std::future::pending().await
        }

        async fn close(&self) {}
    }

    /// Requests seen by a scripted peer, in arrival order.
    pub type RequestLog = Arc<Mutex<Vec<Value>>>;

    /// Attach a fake extension that answers each request with `respond`.
    ///
    /// `respond` receives the decoded request envelope; `None` means the peer
    /// stays silent for that request.
    pub async fn attach_peer<F>(ctx: &Arc<ConnectionContext>, respond: F) -> RequestLog
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        attach_slow_peer(ctx, Duration::ZERO, respond).await
    }

    /// Like `attach_peer`, but every reply is held back by `delay`.
    pub async fn attach_slow_peer<F>(
        ctx: &Arc<ConnectionContext>,
        delay: Duration,
        respond: F,
    ) -> RequestLog
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        let (fake, mut sent) = FakeTransport::new();
        ctx.attach(Arc::new(fake)).await;

        let log: RequestLog = Arc::default();
        let peer_log = Arc::clone(&log);
        let peer_ctx = Arc::clone(ctx);
        tokio::spawn(async move {
            while let Some(frame) = sent.recv().await {
                let request: Value = serde_json::from_str(&frame).unwrap();
                peer_log.lock().unwrap().push(request.clone());
                if let Some(result) = respond(&request) {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let reply = json!({
                        "id": "peer",
                        "type": "messageResponse",
                        "payload": {"requestId": request["id"], "result": result},
                    });
                    peer_ctx.ingest(&reply.to_string()).await;
                }
            }
        });
        log
    }

    /// Answers the page-inspection requests used by snapshots; acks the rest.
    pub fn browser_reply(request: &Value) -> Option<Value> {
        Some(match request["type"].as_str() {
            Some("getUrl") => json!("https://example.com/"),
            Some("getTitle") => json!("Example Domain"),
            Some("browser_snapshot") => json!("- heading \"Example Domain\" [ref=e1]"),
            _ => Value::Null,
        })
    }

    /// Outbound request types in the order they were sent.
    pub fn request_types(log: &RequestLog) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .map(|r| r["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}
