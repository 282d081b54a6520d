//! browser-relay daemon
//!
//! Waits for the browser extension on a local WebSocket and relays JSON
//! commands from stdin to it, writing one JSON result per line to stdout.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use browser_relay::{config::Config, relay, Command, Params};

#[derive(Parser, Debug)]
#[command(name = "browser-relay")]
#[command(about = "Relay browser actions from stdin to a connected browser extension")]
struct Args {
    /// WebSocket port the extension connects to [default: 9009]
    #[arg(long)]
    port: Option<u16>,

    /// Interface to bind [default: localhost]
    #[arg(long)]
    host: Option<String>,

    /// Default request timeout in milliseconds [default: 30000]
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Run a single action once the extension connects, then exit
    #[arg(long)]
    action: Option<String>,

    /// Parameters for --action, as a JSON object
    #[arg(long, default_value = "{}")]
    params: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr so stdout is free for command results)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(ms) = args.timeout_ms {
        anyhow::ensure!(ms > 0, "--timeout-ms must be positive");
        config.request_timeout = Duration::from_millis(ms);
    }

    let single = match args.action {
        Some(action) => {
            let value = serde_json::from_str(&args.params).context("--params is not valid JSON")?;
            let params = Params::from_value(value).context("--params must be a JSON object")?;
            Some(Command::new(action, params))
        }
        None => None,
    };

    info!(
        addr = %config.listen_addr(),
        timeout = ?config.request_timeout,
        single = single.is_some(),
        "Starting browser relay"
    );

    relay::serve_stdio(&config, single).await
}
