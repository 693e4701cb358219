//! Client error types.

use reputation_core::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building or submitting reports.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The report or one of its events violates the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to resolve {server}: {source}")]
    Resolve {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} did not resolve to any address")]
    NoAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    /// The socket accepted fewer bytes than the datagram holds.
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
}

/// Result type alias using [`ClientError`].
pub type ClientResult<T> = Result<T, ClientError>;
