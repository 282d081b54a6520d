//! Extension protocol message types.
//!
//! One JSON envelope per WebSocket text frame. Requests are built here;
//! responses are parsed tolerantly because the extension's reply shape
//! varies between message kinds.

use serde::Serialize;
use serde_json::Value;

/// Request sent from the relay to the extension.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RequestEnvelope {
    /// Build a request with a fresh random correlation id.
    pub fn new(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            payload,
        }
    }
}

/// A response frame reduced to what the correlation table needs.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundResponse {
    /// Id of the request this frame answers.
    pub request_id: String,
    /// `Err` when the extension reported an error.
    pub outcome: Result<Value, String>,
}

impl InboundResponse {
    /// Parse a raw frame.
    ///
    /// Expected shape is
    /// `{"id": .., "type": "messageResponse", "payload": {"requestId": .., "result": .., "error": ..}}`
    /// but the correlation id falls back to the top-level `id`, and the
    /// result/error fall back to top-level `result`/`error`/`data`. A present
    /// top-level `result`, even `null`, shadows `data`.
    /// Returns `None` for frames that carry no usable id.
    pub fn parse(frame: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(frame).ok()?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let top = value.as_object()?;
        let payload = top.get("payload").and_then(Value::as_object);

        let request_id = payload
            .and_then(|p| p.get("requestId"))
            .and_then(non_empty_str)
            .or_else(|| top.get("id").and_then(non_empty_str))?
            .to_string();

        let error = payload
            .and_then(|p| p.get("error"))
            .filter(|v| is_truthy(v))
            .or_else(|| top.get("error").filter(|v| is_truthy(v)));

        let outcome = if let Some(error) = error {
            Err(error_text(error))
        } else {
            let result = payload
                .and_then(|p| p.get("result"))
                .filter(|v| !v.is_null())
                .or_else(|| top.get("result").or_else(|| top.get("data")))
                .cloned()
                .unwrap_or(Value::Null);
            Ok(result)
        };

        Some(Self {
            request_id,
            outcome,
        })
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn error_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), ToString::to_string)
}
