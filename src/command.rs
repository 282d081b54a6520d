//! Controller-facing command and result objects.
//!
//! One `Command` per stdin line, one `CommandResult` per stdout line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RelayError;

/// A command read from the controller.
#[derive(Debug, Clone, Deserialize)]
pub struct Command {
    /// Action name. Missing means empty, which no action matches.
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    params: Option<Map<String, Value>>,
}

impl Command {
    pub fn new(action: impl Into<String>, params: Params) -> Self {
        Self {
            action: action.into(),
            params: Some(params.0),
        }
    }

    /// Parameters, empty when omitted or `null`.
    pub fn params(&self) -> Params {
        Params(self.params.clone().unwrap_or_default())
    }
}

/// Parameter object passed to a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    /// Build from a JSON value; anything but an object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string parameter.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn bool(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Result line written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub const fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// A `{"type": "text", "text": ..}` content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok(serde_json::json!({"type": "text", "text": text.into()}))
    }
}

impl From<RelayError> for CommandResult {
    fn from(err: RelayError) -> Self {
        Self::failure(err.to_string())
    }
}
