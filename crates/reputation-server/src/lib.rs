//! Aggregator for IP reputation reports.
//!
//! [`ReportServer`] listens on a UDP socket and runs each datagram through
//! [`Intake`] on its own task. Accepted reports are passed to a
//! [`ReportHandler`] as [`ReportBatch`]es; everything else is logged and
//! dropped.

pub mod config;
pub mod error;
pub mod handler;
pub mod intake;
pub mod replay;
pub mod server;
pub mod shutdown;
pub mod stats;

pub use config::{load_config, validate_config, ConfigError, ConfigLoader, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{
    LoggingHandler, ReceivedEvent, RecordingHandler, ReportBatch, ReportHandler, StaticCredentials,
};
pub use intake::{Intake, Rejection};
pub use replay::ReplayCache;
pub use server::ReportServer;
pub use shutdown::shutdown_signal;
pub use stats::{ServerStats, StatsSnapshot};
