//! browser-relay library
//!
//! This crate provides the core functionality for the browser-relay daemon:
//! - Connection context correlating extension requests with their responses
//! - WebSocket listener and transport for the browser extension
//! - Stdio command loop, action dispatch and terminal markers

pub mod actions;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod listener;
pub mod relay;
pub mod transport;

pub use command::{Command, CommandResult, Params};
pub use context::ConnectionContext;
pub use error::RelayError;
