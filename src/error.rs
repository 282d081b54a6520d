//! Error kinds surfaced by the relay.
//!
//! Every variant ends up as a failed command result whose `error` field is
//! the `Display` text below. None of them terminate the command loop.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while relaying a command to the browser extension.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No extension is attached.
    #[error(
        "not connected to the browser extension. Click the extension icon and press 'Connect' first."
    )]
    NotConnected,

    /// The command names an action outside the dispatch table.
    #[error("unknown action: {action}. available: {available}")]
    UnknownAction { action: String, available: String },

    /// The extension did not answer before the request deadline.
    #[error("request '{request_type}' timed out after {}ms", .timeout.as_millis())]
    Timeout {
        request_type: String,
        timeout: Duration,
    },

    /// Writing to (or reading from) the extension socket failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The extension answered with an explicit error.
    #[error("{0}")]
    Remote(String),

    /// A handler failed after the request round-trip.
    #[error("{0}")]
    Handler(String),

    /// Local file I/O performed by a handler.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
