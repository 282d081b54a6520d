//! Element interaction and keyboard/timing helpers.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::capture::aria_snapshot;
use super::{display, missing, missing_ref, HandlerResult};
use crate::command::{CommandResult, Params};
use crate::context::ConnectionContext;

/// Clicks get a short deadline: a click that navigates tears down the
/// content script before it can answer.
const CLICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after an unanswered click so the next page can load.
const NAVIGATION_SETTLE: Duration = Duration::from_secs(1);

pub(super) async fn click(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(element) = params.str("ref") else {
        return Ok(missing_ref());
    };

    match ctx
        .send_request("browser_click", Some(json!({"ref": element})), CLICK_TIMEOUT)
        .await
    {
        Ok(_) => {}
        Err(e) if e.is_timeout() => {
            info!(element, "Click went unanswered, assuming navigation");
            tokio::time::sleep(NAVIGATION_SETTLE).await;
        }
        Err(e) => return Err(e),
    }

    let status = format!("clicked ref={element}");
    Ok(CommandResult::ok(aria_snapshot(ctx, &status).await?))
}

pub(super) async fn hover(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(element) = params.str("ref") else {
        return Ok(missing_ref());
    };

    ctx.request("browser_hover", Some(json!({"ref": element})))
        .await?;
    let status = format!("hovered ref={element}");
    Ok(CommandResult::ok(aria_snapshot(ctx, &status).await?))
}

pub(super) async fn type_text(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(element) = params.str("ref") else {
        return Ok(missing_ref());
    };
    let Some(text) = params.str("text") else {
        return Ok(missing("text"));
    };
    let submit = params.bool("submit");

    ctx.request(
        "browser_type",
        Some(json!({"ref": element, "text": text, "submit": submit})),
    )
    .await?;
    let status = format!("typed \"{text}\" into ref={element}");
    Ok(CommandResult::ok(aria_snapshot(ctx, &status).await?))
}

pub(super) async fn select_option(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(element) = params.str("ref") else {
        return Ok(missing_ref());
    };
    let values = match params.get("values") {
        Some(Value::Array(values)) if !values.is_empty() => values.clone(),
        Some(Value::String(value)) if !value.is_empty() => vec![Value::String(value.clone())],
        _ => return Ok(missing("values")),
    };

    ctx.request(
        "browser_select_option",
        Some(json!({"ref": element, "values": values})),
    )
    .await?;
    let status = format!("selected option in ref={element}");
    Ok(CommandResult::ok(aria_snapshot(ctx, &status).await?))
}

pub(super) async fn drag(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let (Some(start), Some(end)) = (params.str("startRef"), params.str("endRef")) else {
        return Ok(CommandResult::failure(
            "missing startRef or endRef parameter",
        ));
    };

    ctx.request("browser_drag", Some(json!({"startRef": start, "endRef": end})))
        .await?;
    let status = format!("dragged ref={start} to ref={end}");
    Ok(CommandResult::ok(aria_snapshot(ctx, &status).await?))
}

pub(super) async fn press_key(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(key) = params.str("key") else {
        return Ok(missing("key"));
    };

    ctx.request("browser_press_key", Some(json!({"key": key})))
        .await?;
    Ok(CommandResult::text(format!("pressed {key}")))
}

/// Ask the extension to wait `time` seconds (default 1).
pub(super) async fn wait(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let time = params.get("time").cloned().unwrap_or_else(|| json!(1));
    debug!(time = %time, "Waiting in page");

    ctx.request("browser_wait", Some(json!({"time": time})))
        .await?;
    Ok(CommandResult::text(format!("waited {} seconds", display(&time))))
}
