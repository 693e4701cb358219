//! Configuration validation.

use super::types::ServerConfig;
use reputation_core::MAX_USERNAME_LEN;
use thiserror::Error;

/// Smallest receive buffer that still holds a header and a signature.
const MIN_RECV_BUFFER: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Receive buffer of {0} bytes is too small")]
    RecvBufferTooSmall(usize),

    #[error("Freshness window must be positive")]
    InvalidFreshnessWindow,

    #[error("Purge interval must be positive")]
    InvalidPurgeInterval,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("Username {0:?} is longer than 63 bytes")]
    UsernameTooLong(String),

    #[error("User {0:?} has an empty secret")]
    EmptySecret(String),
}

/// Validate server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.socket_addr().is_none() {
        errors.push(ConfigError::InvalidHost(config.server.host.clone()));
    }

    if config.server.recv_buffer < MIN_RECV_BUFFER {
        errors.push(ConfigError::RecvBufferTooSmall(config.server.recv_buffer));
    }

    if config.protocol.freshness_window_secs == 0 {
        errors.push(ConfigError::InvalidFreshnessWindow);
    }

    if config.protocol.purge_interval_secs == 0 {
        errors.push(ConfigError::InvalidPurgeInterval);
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogFormat(config.logging.format.clone()));
    }

    for (username, secret) in &config.users {
        if username.len() > MAX_USERNAME_LEN {
            errors.push(ConfigError::UsernameTooLong(username.clone()));
        }
        if secret.expose().is_empty() {
            errors.push(ConfigError::EmptySecret(username.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
