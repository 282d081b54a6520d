//! End-to-end tests: a real WebSocket "extension" talking to the relay.

use std::sync::Arc;
use std::time::Duration;

use browser_relay::relay::execute_command;
use browser_relay::{listener, ConnectionContext, Params};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn start_relay(timeout: Duration) -> (Arc<ConnectionContext>, String) {
    let ctx = Arc::new(ConnectionContext::new(timeout));
    let tcp = listener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", tcp.local_addr().unwrap());
    tokio::spawn(listener::serve(tcp, Arc::clone(&ctx)));
    (ctx, url)
}

/// Connect a fake extension whose page title is `title`. Returns the number
/// of requests it answered once the relay closes it.
async fn connect_extension(url: &str, title: &'static str) -> JoinHandle<usize> {
    let (ws, _) = connect_async(url).await.unwrap();
    tokio::spawn(async move {
        let (mut tx, mut rx) = ws.split();
        let mut served = 0;
        while let Some(Ok(msg)) = rx.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let result = match request["type"].as_str().unwrap_or_default() {
                "getUrl" => json!("https://example.com/"),
                "getTitle" => json!(title),
                "browser_snapshot" => json!("- document"),
                "browser_hover" => {
                    // Never answered.
                    continue;
                }
                _ => Value::Null,
            };
            let reply = json!({
                "id": "from-extension",
                "type": "messageResponse",
                "payload": {"requestId": request["id"], "result": result},
            });
            if tx.send(Message::Text(reply.to_string().into())).await.is_err() {
                break;
            }
            served += 1;
        }
        served
    })
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn params(value: Value) -> Params {
    Params::from_value(value).unwrap()
}

#[tokio::test]
async fn navigate_round_trip_over_websocket() {
    let (ctx, url) = start_relay(Duration::from_secs(5)).await;

    let status = execute_command(&ctx, "status", &Params::default()).await;
    assert_eq!(status.data.unwrap(), json!({"connected": false}));

    let _extension = connect_extension(&url, "Example Domain").await;
    eventually(|| ctx.has_transport()).await;

    let result = execute_command(
        &ctx,
        "navigate",
        &params(json!({"url": "https://example.com"})),
    )
    .await;
    assert!(result.success, "{result:?}");
    let text = result.data.unwrap()["text"].as_str().unwrap().to_string();
    assert!(text.contains("- Page Title: Example Domain"));
    assert_eq!(ctx.pending_count().await, 0);
}

#[tokio::test]
async fn new_extension_replaces_old_one() {
    let (ctx, url) = start_relay(Duration::from_secs(5)).await;

    let first = connect_extension(&url, "First").await;
    eventually(|| ctx.has_transport()).await;
    let second = connect_extension(&url, "Second").await;

    // The relay closes the first extension when the second attaches.
    tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .expect("first extension was not closed")
        .unwrap();
    assert!(ctx.has_transport());

    let result = execute_command(&ctx, "snapshot", &Params::default()).await;
    let text = result.data.unwrap()["text"].as_str().unwrap().to_string();
    assert!(text.contains("- Page Title: Second"));

    let status = execute_command(&ctx, "status", &Params::default()).await;
    assert_eq!(status.data.unwrap(), json!({"connected": true}));
    assert!(!second.is_finished());
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let (ctx, url) = start_relay(Duration::from_millis(10)).await;
    let _extension = connect_extension(&url, "Example").await;
    eventually(|| ctx.has_transport()).await;

    let result = execute_command(&ctx, "hover", &params(json!({"ref": "e1"}))).await;
    assert_eq!(
        result.error.as_deref(),
        Some("request 'browser_hover' timed out after 10ms")
    );
    assert_eq!(ctx.pending_count().await, 0);
}

#[tokio::test]
async fn disconnect_clears_connection() {
    let (ctx, url) = start_relay(Duration::from_secs(5)).await;

    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    eventually(|| ctx.has_transport()).await;

    ws.close(None).await.unwrap();
    eventually(|| !ctx.has_transport()).await;

    let result = execute_command(&ctx, "snapshot", &Params::default()).await;
    assert!(result.error.unwrap().starts_with("not connected"));
}
