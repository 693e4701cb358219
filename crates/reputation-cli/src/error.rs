//! CLI error handling.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use reputation_client::ClientError;
use reputation_core::ProtocolError;
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Usage {
        message: String,
        hint: Option<String>,
    },

    #[error("{message} {}: {source}", .path.display())]
    Io {
        message: String,
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    #[error("{message}: {source}")]
    Network {
        message: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid report: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usage { .. } => "E001",
            Self::Io { .. } => "E002",
            Self::Network { .. } => "E003",
            Self::Protocol(_) => "E004",
            Self::Other(_) => "E999",
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        let code = match self {
            Self::Usage { .. } => 2,
            Self::Io { .. } => 3,
            Self::Network { .. } => 4,
            Self::Protocol(_) => 5,
            Self::Other(_) => 1,
        };
        ExitCode::from(code)
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Usage { hint, .. } => hint.as_deref(),
            Self::Network { .. } => Some("Check the server name and that UDP traffic is allowed"),
            _ => None,
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            hint: None,
        }
    }

    /// Create a usage error with hint
    pub fn usage_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an IO error with path
    pub fn io_with_path(
        message: impl Into<String>,
        source: io::Error,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source,
            path: path.into(),
        }
    }
}

impl From<ClientError> for CliError {
    fn from(source: ClientError) -> Self {
        match source {
            ClientError::Protocol(e) => Self::Protocol(e),
            source => Self::Network {
                message: "failed to submit report".to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_protocol_errors_unwrap() {
        let err = CliError::from(ClientError::Protocol(ProtocolError::ReservedEvent));
        assert!(matches!(err, CliError::Protocol(ProtocolError::ReservedEvent)));
        assert_eq!(err.code(), "E004");
    }

    #[test]
    fn test_network_errors_have_hint() {
        let err = CliError::from(ClientError::NoAddress("nowhere:6568".to_string()));
        assert_eq!(err.code(), "E003");
        assert!(err.hint().is_some());
        assert!(err.to_string().starts_with("failed to submit report"));
    }

    #[test]
    fn test_io_error_names_path() {
        let source = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = CliError::io_with_path("failed to read datagram", source, "/tmp/capture.bin");
        assert_eq!(
            err.to_string(),
            "failed to read datagram /tmp/capture.bin: not found"
        );
        assert_eq!(err.code(), "E002");
    }

    #[test]
    fn test_usage_hint() {
        let err = CliError::usage_with_hint("bad event", "run `reputation events`");
        assert_eq!(err.hint(), Some("run `reputation events`"));
        assert!(CliError::usage("x").hint().is_none());
    }
}
