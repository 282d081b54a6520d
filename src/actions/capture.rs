//! Page inspection: accessibility snapshots, screenshots, console logs, HTML.

use std::path::Path;

use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{display, missing, HandlerResult};
use crate::command::{CommandResult, Params};
use crate::context::ConnectionContext;
use crate::error::RelayError;

/// Capture the page URL, title and ARIA snapshot as one text block.
///
/// `status` is prepended as its own line when non-empty.
pub(super) async fn aria_snapshot(ctx: &ConnectionContext, status: &str) -> Result<Value, RelayError> {
    let url = ctx.request("getUrl", None).await?;
    let title = ctx.request("getTitle", None).await?;
    let snapshot = ctx.request("browser_snapshot", Some(json!({}))).await?;

    let status_line = if status.is_empty() {
        String::new()
    } else {
        format!("{status}\n")
    };

    let text = format!(
        "{status_line}- Page URL: {}\n- Page Title: {}\n- Page Snapshot\n```yaml\n{}\n```",
        display(&url),
        display(&title),
        display(&snapshot),
    );

    Ok(json!({"type": "text", "text": text}))
}

pub(super) async fn snapshot(ctx: &ConnectionContext) -> HandlerResult {
    Ok(CommandResult::ok(aria_snapshot(ctx, "").await?))
}

/// Screenshot the visible page. With `savePath` the PNG is written to disk;
/// otherwise the base64 data is returned inline.
pub(super) async fn screenshot(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let image = ctx.request("browser_screenshot", Some(json!({}))).await?;

    let Some(save_path) = params.str("savePath") else {
        return Ok(CommandResult::ok(json!({
            "type": "image",
            "data": image,
            "mimeType": "image/png",
        })));
    };

    let encoded = image
        .as_str()
        .ok_or_else(|| RelayError::Handler("screenshot data is not a base64 string".to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| RelayError::Handler(format!("invalid screenshot data: {e}")))?;

    write_file(Path::new(save_path), &bytes).await?;
    info!(path = %save_path, bytes = bytes.len(), "Saved screenshot");
    Ok(CommandResult::text(format!("screenshot saved to {save_path}")))
}

pub(super) async fn console_logs(ctx: &ConnectionContext) -> HandlerResult {
    let logs = ctx.request("browser_get_console_logs", Some(json!({}))).await?;

    let text = match &logs {
        Value::Null => String::new(),
        Value::Array(entries) => entries.iter().map(display).collect::<Vec<_>>().join("\n"),
        other => display(other),
    };

    if text.is_empty() {
        Ok(CommandResult::text("(no logs)"))
    } else {
        Ok(CommandResult::text(text))
    }
}

/// Save the page HTML to `savePath` and report its size.
pub(super) async fn page_html(ctx: &ConnectionContext, params: &Params) -> HandlerResult {
    let Some(save_path) = params.str("savePath") else {
        return Ok(missing("savePath"));
    };

    let html = ctx.request("getPageHtml", Some(json!({}))).await?;
    let html = display(&html);

    write_file(Path::new(save_path), html.as_bytes()).await?;
    let size = tokio::fs::metadata(save_path).await?.len();
    #[allow(clippy::cast_precision_loss)]
    let size_kb = size as f64 / 1024.0;

    Ok(CommandResult::text(format!(
        "HTML saved to {save_path} ({size_kb:.1} KB)"
    )))
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), RelayError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    debug!(path = %path.display(), "Wrote file");
    Ok(())
}
