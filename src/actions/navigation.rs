//! Page navigation and history.

use serde_json::json;
use tracing::info;

use super::capture::aria_snapshot;
use super::{missing, HandlerResult};
use crate::command::{CommandResult, Params};
use crate::context::ConnectionContext;

pub(super) async fn navigate(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(url) = params.str("url") else {
        return Ok(missing("url"));
    };

    info!(url, "Navigating");
    ctx.request("browser_navigate", Some(json!({"url": url})))
        .await?;
    Ok(CommandResult::ok(aria_snapshot(ctx, "").await?))
}

pub(super) async fn go_back(ctx: &ConnectionContext) -> HandlerResult {
    ctx.request("browser_go_back", Some(json!({}))).await?;
    Ok(CommandResult::ok(aria_snapshot(ctx, "").await?))
}

pub(super) async fn go_forward(ctx: &ConnectionContext) -> HandlerResult {
    ctx.request("browser_go_forward", Some(json!({}))).await?;
    Ok(CommandResult::ok(aria_snapshot(ctx, "").await?))
}
