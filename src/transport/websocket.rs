//! WebSocket transport for an attached browser extension.
//!
//! Owns the write half of an accepted socket through a dedicated writer task.
//! Sends are queued on a channel, so callers never contend for the sink.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::Transport;
use crate::error::RelayError;

/// Outbound queue depth before `send` starts waiting on the writer task.
const OUTBOUND_QUEUE: usize = 256;

/// Transport backed by the write half of a WebSocket connection.
pub struct WebSocketTransport {
    outbound: mpsc::Sender<Message>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Spawn the writer task for `sink` and return the handle used to feed it.
    ///
    /// The task ends after forwarding a close frame, when the sink errors, or
    /// when `close` finds the queue full and aborts it. An aborted writer
    /// drops the sink without flushing.
    pub fn spawn<S>(mut sink: S) -> Self
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display,
    {
        let (outbound, mut queue) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let (shutdown, mut abort) = watch::channel(false);

        tokio::spawn(async move {
            let aborted = loop {
                let msg = tokio::select! {
                    msg = queue.recv() => match msg {
                        Some(msg) => msg,
                        None => break false,
                    },
                    Ok(()) = abort.changed() => break true,
                };
                let is_close = matches!(msg, Message::Close(_));
                tokio::select! {
                    sent = sink.send(msg) => {
                        if let Err(e) = sent {
                            warn!(error = %e, "WebSocket write error");
                            break false;
                        }
                    }
                    Ok(()) = abort.changed() => break true,
                }
                if is_close {
                    break false;
                }
            };
            if aborted {
                debug!("WebSocket writer aborted, peer stopped reading");
            } else {
                let _ = sink.close().await;
                debug!("WebSocket writer finished");
            }
        });

        Self {
            outbound,
            shutdown,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, frame: String) -> Result<(), RelayError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RelayError::Transport("connection closed".to_string()));
        }
        self.outbound
            .send(Message::Text(frame.into()))
            .await
            .map_err(|_| RelayError::Transport("connection closed".to_string()))
    }

    /// Never waits on the peer: a full queue aborts the writer instead.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.outbound.try_send(Message::Close(None)).is_err() {
            self.shutdown.send_replace(true);
        }
    }
}
