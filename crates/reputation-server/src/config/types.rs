//! Server configuration types.

use reputation_core::{SecretString, DEFAULT_PORT, FRESHNESS_WINDOW_SECS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket binding.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Report acceptance rules.
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Shared secrets, keyed by username.
    #[serde(default)]
    pub users: BTreeMap<String, SecretString>,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// UDP port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest datagram accepted, in bytes.
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_recv_buffer() -> usize {
    65535
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            recv_buffer: default_recv_buffer(),
        }
    }
}

impl ServerBindConfig {
    /// Bind address, if `host` is an IP literal.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port))
    }
}

/// Report acceptance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Largest accepted difference between a report's timestamp and the
    /// server clock.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u32,
    /// How often expired replay entries are dropped.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_freshness_window() -> u32 {
    FRESHNESS_WINDOW_SECS
}

fn default_purge_interval() -> u64 {
    60
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl ProtocolConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact or json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 6568);
        assert_eq!(config.protocol.freshness_window_secs, 120);
        assert_eq!(config.protocol.purge_interval(), Duration::from_secs(60));
        assert!(config.users.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let mut bind = ServerBindConfig::default();
        assert_eq!(bind.socket_addr(), Some("0.0.0.0:6568".parse().unwrap()));
        bind.host = "::1".to_string();
        bind.port = 7000;
        assert_eq!(bind.socket_addr(), Some("[::1]:7000".parse().unwrap()));
        bind.host = "reputation.example".to_string();
        assert_eq!(bind.socket_addr(), None);
    }

    #[test]
    fn test_secrets_are_redacted_when_serialized() {
        let mut config = ServerConfig::default();
        config.users.insert("dfs".to_string(), SecretString::from("foo"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("\"foo\""));
    }
}
