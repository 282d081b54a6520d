//! Relay configuration.
//!
//! Values come from `BROWSER_RELAY_*` environment variables with built-in
//! defaults; command-line flags override both (see `main.rs`).

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

/// Port the extension connects to unless told otherwise.
pub const DEFAULT_PORT: u16 = 9009;

/// Runtime configuration for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interface the WebSocket listener binds to.
    pub host: String,

    /// Port the WebSocket listener binds to.
    pub port: u16,

    /// Deadline for requests whose handler does not choose its own.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_millis(default_timeout_ms()),
        }
    }
}

impl Config {
    /// Load from the process environment.
    ///
    /// Reads `BROWSER_RELAY_HOST`, `BROWSER_RELAY_PORT` and
    /// `BROWSER_RELAY_TIMEOUT_MS`. Unset variables fall back to defaults;
    /// set but unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("BROWSER_RELAY_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }

        if let Some(port) = lookup("BROWSER_RELAY_PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid BROWSER_RELAY_PORT: {port:?}"))?;
        }

        if let Some(ms) = lookup("BROWSER_RELAY_TIMEOUT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("Invalid BROWSER_RELAY_TIMEOUT_MS: {ms:?}"))?;
            anyhow::ensure!(ms > 0, "BROWSER_RELAY_TIMEOUT_MS must be positive");
            config.request_timeout = Duration::from_millis(ms);
        }

        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// `host:port` string for binding the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "localhost".into()
}

const fn default_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 9009);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.listen_addr(), "localhost:9009");
    }

    #[test]
    fn env_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("BROWSER_RELAY_HOST", "127.0.0.1"),
            ("BROWSER_RELAY_PORT", " 3000 "),
            ("BROWSER_RELAY_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:3000");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn blank_host_keeps_default() {
        let config = Config::from_lookup(lookup(&[("BROWSER_RELAY_HOST", "  ")])).unwrap();
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = Config::from_lookup(lookup(&[("BROWSER_RELAY_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("BROWSER_RELAY_PORT"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("BROWSER_RELAY_TIMEOUT_MS", "0")])).is_err());
    }
}
