//! Relay process configuration.

use crate::error::{RelayError, Result};
use crate::liveness::DEFAULT_HEARTBEAT_INTERVAL;
use crate::pending::DEFAULT_RETENTION;
use std::net::SocketAddr;
use std::time::Duration;

/// Origins allowed to call the HTTP control plane from a browser.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://www.binance.org",
    "https://testnet.binance.org",
    "https://trustwalletapp.com",
    "https://trustwallet.com",
    "https://local.binance.org:3000",
];

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Bind host. May also carry a port (`ip:port`), which then wins over `port`.
    pub host: String,

    pub port: u16,

    /// Webhook URLs accepted by the registration endpoint.
    /// None = every webhook is accepted.
    pub webhook_whitelist: Option<Vec<String>>,

    /// Interval between heartbeat sweeps.
    /// Default: 30s
    pub heartbeat_interval: Duration,

    /// How long undelivered messages are kept.
    /// Default: 30min
    pub retention: Duration,

    /// Interval between stats log lines.
    /// Default: 30min
    pub stats_interval: Duration,

    pub allowed_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            webhook_whitelist: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            retention: DEFAULT_RETENTION,
            stats_interval: Duration::from_secs(30 * 60),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RelayConfig {
    /// Parse a comma separated whitelist. Blank entries are ignored; an
    /// empty or absent list disables the check.
    pub fn parse_whitelist(raw: Option<&str>) -> Option<Vec<String>> {
        let entries: Vec<String> = raw?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        (!entries.is_empty()).then_some(entries)
    }

    /// Whether `webhook` may be registered.
    pub fn webhook_allowed(&self, webhook: &str) -> bool {
        match &self.webhook_whitelist {
            Some(list) => list.iter().any(|w| w == webhook),
            None => true,
        }
    }

    /// Address to bind.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = if self.host.contains(':') {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        };
        addr.parse::<SocketAddr>()
            .map_err(|e| RelayError::InvalidConfig(format!("listen address {addr}: {e}")))
    }
}
