//! Browser actions the controller can invoke.
//!
//! Each action is a thin translation from command parameters into one or
//! more extension requests. Handlers only talk to the extension through
//! `ConnectionContext`; they never hold the transport themselves.

mod capture;
mod interaction;
mod navigation;

use serde_json::Value;

use crate::command::{CommandResult, Params};
use crate::context::ConnectionContext;
use crate::error::RelayError;

/// Result of running one handler. `Err` is reported as a failed result by
/// the command loop.
pub type HandlerResult = Result<CommandResult, RelayError>;

/// Every action in the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Navigate,
    GoBack,
    GoForward,
    Click,
    Hover,
    Type,
    SelectOption,
    Drag,
    PressKey,
    Wait,
    Screenshot,
    Snapshot,
    GetConsoleLogs,
    GetHtml,
}

impl Action {
    pub const ALL: [Self; 14] = [
        Self::Navigate,
        Self::GoBack,
        Self::GoForward,
        Self::Click,
        Self::Hover,
        Self::Type,
        Self::SelectOption,
        Self::Drag,
        Self::PressKey,
        Self::Wait,
        Self::Screenshot,
        Self::Snapshot,
        Self::GetConsoleLogs,
        Self::GetHtml,
    ];

    /// Name used in the `action` field of a command.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::GoBack => "go_back",
            Self::GoForward => "go_forward",
            Self::Click => "click",
            Self::Hover => "hover",
            Self::Type => "type",
            Self::SelectOption => "select_option",
            Self::Drag => "drag",
            Self::PressKey => "press_key",
            Self::Wait => "wait",
            Self::Screenshot => "screenshot",
            Self::Snapshot => "snapshot",
            Self::GetConsoleLogs => "get_console_logs",
            Self::GetHtml => "get_html",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }

    /// Whether the handler needs an attached extension. Checked by the
    /// command loop before the handler runs.
    pub const fn requires_transport(self) -> bool {
        true
    }

    /// Sorted, comma-separated list of action names.
    pub fn available() -> String {
        let mut names: Vec<&str> = Self::ALL.iter().map(|a| a.name()).collect();
        names.sort_unstable();
        names.join(", ")
    }

    /// Run this action's handler.
    pub async fn run(self, ctx: &ConnectionContext, params: &Params) -> HandlerResult {
        match self {
            Self::Navigate => navigation::navigate(ctx, params).await,
            Self::GoBack => navigation::go_back(ctx).await,
            Self::GoForward => navigation::go_forward(ctx).await,
            Self::Click => interaction::click(ctx, params).await,
            Self::Hover => interaction::hover(ctx, params).await,
            Self::Type => interaction::type_text(ctx, params).await,
            Self::SelectOption => interaction::select_option(ctx, params).await,
            Self::Drag => interaction::drag(ctx, params).await,
            Self::PressKey => interaction::press_key(ctx, params).await,
            Self::Wait => interaction::wait(ctx, params).await,
            Self::Screenshot => capture::screenshot(ctx, params).await,
            Self::Snapshot => capture::snapshot(ctx).await,
            Self::GetConsoleLogs => capture::console_logs(ctx).await,
            Self::GetHtml => capture::page_html(ctx, params).await,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Render a result value the way it reads in text: strings bare, everything
/// else as JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn missing(name: &str) -> CommandResult {
    CommandResult::failure(format!("missing {name} parameter"))
}

fn missing_ref() -> CommandResult {
    CommandResult::failure("missing ref parameter (use a ref value from the snapshot)")
}
