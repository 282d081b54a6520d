//! The controller-facing command loop.
//!
//! Reads one JSON command per stdin line, dispatches it and writes one JSON
//! result per stdout line. Runs alongside the WebSocket listener that feeds
//! the shared `ConnectionContext`.

pub mod marker;
pub mod output;

use std::fmt::Display;
use std::future::Future;
use std::io::{self, Write};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::FutureExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::actions::{Action, HandlerResult};
use crate::command::{Command, CommandResult, Params};
use crate::config::Config;
use crate::context::ConnectionContext;
use crate::error::RelayError;
use crate::listener;

pub use marker::{MarkerTracker, Observed};
pub use output::LineWriter;

/// A command name resolved against the control actions and the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Status,
    Quit,
    Action(Action),
}

impl Resolved {
    pub fn from_name(name: &str) -> Result<Self, RelayError> {
        match name {
            "status" => Ok(Self::Status),
            "quit" => Ok(Self::Quit),
            other => Action::from_name(other).map(Self::Action).ok_or_else(|| {
                RelayError::UnknownAction {
                    action: other.to_string(),
                    available: Action::available(),
                }
            }),
        }
    }
}

/// Whether the loop keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one command to completion. Never fails: every error becomes a
/// failed result.
pub async fn execute_command(
    ctx: &ConnectionContext,
    action: &str,
    params: &Params,
) -> CommandResult {
    let action = match Resolved::from_name(action) {
        Ok(Resolved::Status) => {
            return CommandResult::ok(json!({"connected": ctx.has_transport()}));
        }
        Ok(Resolved::Quit) => {
            return CommandResult::ok(json!({"message": "server shutting down"}));
        }
        Ok(Resolved::Action(action)) => action,
        Err(e) => return e.into(),
    };

    if action.requires_transport() && !ctx.has_transport() {
        return RelayError::NotConnected.into();
    }

    debug!(%action, "Running action");
    match guard_handler(action, action.run(ctx, params)).await {
        Ok(result) => result,
        Err(e) => {
            warn!(%action, error = %e, "Action failed");
            e.into()
        }
    }
}

/// Drive a handler future, turning a panic inside it into a `Handler` error.
async fn guard_handler<F>(action: impl Display, handler: F) -> HandlerResult
where
    F: Future<Output = HandlerResult>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(%action, %message, "Action panicked");
            Err(RelayError::Handler(format!(
                "internal error in {action}: {message}"
            )))
        }
    }
}

/// Interactive command loop over a line stream.
///
/// `output` receives result lines; `diagnostics` receives marker echoes.
pub struct CommandLoop<O: Write, D: Write> {
    ctx: Arc<ConnectionContext>,
    output: LineWriter<O>,
    diagnostics: LineWriter<D>,
    markers: MarkerTracker,
}

impl<O: Write, D: Write> CommandLoop<O, D> {
    pub fn new(ctx: Arc<ConnectionContext>, output: O, diagnostics: D) -> Self {
        Self {
            ctx,
            output: LineWriter::new(output),
            diagnostics: LineWriter::new(diagnostics),
            markers: MarkerTracker::default(),
        }
    }

    /// Read lines until end of input or `quit`.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, mut input: R) -> io::Result<()> {
        info!("Interactive mode ready, waiting for commands");
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                debug!("End of input");
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            if self.handle_line(&line).await? == Flow::Quit {
                info!("Quit requested");
                return Ok(());
            }
        }
    }

    /// Process one input line. Only a failed stdout write is an error.
    pub async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        match self.markers.observe(line) {
            Observed::NotMarker => {}
            Observed::Started(echo) => {
                self.diagnostic(&echo);
                return Ok(Flow::Continue);
            }
            Observed::Ended => return Ok(Flow::Continue),
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Ignoring non-JSON input line");
                return Ok(Flow::Continue);
            }
        };

        let parsed = if value.is_object() {
            serde_json::from_value::<Command>(value).map_err(|e| e.to_string())
        } else {
            Err("expected a JSON object".to_string())
        };

        let (result, flow) = match parsed {
            Ok(command) => {
                let result =
                    execute_command(&self.ctx, &command.action, &command.params()).await;
                let flow = if command.action == "quit" {
                    Flow::Quit
                } else {
                    Flow::Continue
                };
                (result, flow)
            }
            Err(e) => (
                CommandResult::failure(format!("invalid command: {e}")),
                Flow::Continue,
            ),
        };

        self.output.emit(&result)?;
        if let Some(end) = self.markers.complete() {
            self.diagnostic(&end);
        }
        Ok(flow)
    }

    fn diagnostic(&self, line: &str) {
        if let Err(e) = self.diagnostics.write_line(line) {
            warn!(error = %e, "Failed to write marker");
        }
    }

    pub fn into_parts(self) -> (O, D) {
        (self.output.into_inner(), self.diagnostics.into_inner())
    }
}

/// Wait for the extension, run `command` once and write its result.
pub async fn run_single<W: Write>(
    ctx: &ConnectionContext,
    command: &Command,
    output: &LineWriter<W>,
) -> io::Result<()> {
    info!(action = %command.action, "Single-command mode, waiting for the extension to connect");
    ctx.wait_for_transport().await;
    let result = execute_command(ctx, &command.action, &command.params()).await;
    output.emit(&result)
}

/// Serve commands on stdio until end of input, `quit`, or (with `single`)
/// after one command.
pub async fn serve_stdio(config: &Config, single: Option<Command>) -> Result<()> {
    let ctx = Arc::new(ConnectionContext::new(config.request_timeout));

    let tcp = listener::bind(&config.listen_addr()).await?;
    let server = tokio::spawn(listener::serve(tcp, Arc::clone(&ctx)));

    let outcome = if let Some(command) = single {
        let output = LineWriter::new(io::stdout());
        run_single(&ctx, &command, &output)
            .await
            .context("Failed to write result")
    } else {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        CommandLoop::new(Arc::clone(&ctx), io::stdout(), io::stderr())
            .run(stdin)
            .await
            .context("Command loop failed")
    };

    server.abort();
    ctx.close().await;
    info!("Relay shut down");
    outcome
}
