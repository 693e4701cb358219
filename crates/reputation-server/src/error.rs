//! Server error types.

use crate::config::ConfigError;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid configuration: {}", join(.0))]
    Config(Vec<ConfigError>),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ConfigError>> for ServerError {
    fn from(errors: Vec<ConfigError>) -> Self {
        ServerError::Config(errors)
    }
}

/// Result type alias using [`ServerError`].
pub type ServerResult<T> = Result<T, ServerError>;
