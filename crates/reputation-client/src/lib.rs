//! Sensor-side client.
//!
//! Record events as they happen and call [`ReportClient::send_report`]
//! periodically. Short reports are held back until enough events have
//! accumulated, the caller forces a send, or an hour has passed.
//!
//! ```no_run
//! # async fn run() -> Result<(), reputation_client::ClientError> {
//! use reputation_client::{ClientConfig, ReportClient};
//! use reputation_core::EventType;
//!
//! let config = ClientConfig::new("reputation.example.net", "dfs", "foo")
//!     .with_software("postfix-rep", Some("1.0".to_string()));
//! let mut client = ReportClient::connect(config).await?;
//! client.record("5.79.73.204".parse().unwrap(), EventType::AutoSpam)?;
//! client.flush().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod queue;

pub use client::{ClientConfig, ReportClient, SendOutcome, MAX_REPORT_INTERVAL};
pub use error::{ClientError, ClientResult};
pub use queue::EventQueue;
