//! WebSocket listener the browser extension connects to.
//!
//! Every accepted connection is attached to the shared context, replacing
//! whichever extension was attached before. Inbound frames are forwarded to
//! `ConnectionContext::ingest_from` until the socket closes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::context::ConnectionContext;
use crate::transport::WebSocketTransport;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the listening socket.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket listener to {addr} (is another relay running?)"))?;
    let local = listener.local_addr().context("Failed to read listener address")?;
    info!(addr = %local, "WebSocket server listening on ws://{local}");
    Ok(listener)
}

/// Accept extension connections forever.
pub async fn serve(listener: TcpListener, ctx: Arc<ConnectionContext>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, ctx).await {
                        warn!(%peer, error = %e, "Extension connection failed");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<ConnectionContext>,
) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    let (sink, mut frames) = ws_stream.split();

    let id = ctx.attach(Arc::new(WebSocketTransport::spawn(sink))).await;
    debug!(connection = id, %peer, "Extension attached");

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => ctx.ingest_from(id, text.as_str()).await,
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => ctx.ingest_from(id, text).await,
                Err(_) => debug!(connection = id, len = bytes.len(), "Ignoring non-UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    ctx.detach(id).await;
    Ok(())
}
