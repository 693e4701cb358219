//! Wire protocol for IP reputation reporting.
//!
//! A sensor observes SMTP clients and reports events about their IP
//! addresses to an aggregator. Reports travel as single UDP datagrams:
//!
//! ```text
//! version | ulen | username | nonce[8] | timestamp[4] | subreports.. | 0 | hmac[10]
//! ```
//!
//! The trailing ten bytes are the leading bytes of an HMAC-SHA1 over
//! everything before them, keyed with a secret shared between sensor and
//! aggregator.

pub mod address;
pub mod error;
pub mod event;
pub mod report;
pub mod secret;
pub mod signature;
pub mod subreport;

pub use address::{check_reportable, is_reportable};
pub use error::{ProtocolError, Result};
pub use event::{EventType, IpEvent, RepeatedIpEvent};
pub use report::{unix_timestamp, Report, SignedReport};
pub use secret::{Secret, SecretString};
pub use subreport::SubReport;

/// Protocol version carried in the first byte of every report.
pub const PROTOCOL_VERSION: u8 = 2;

/// Default aggregator UDP port.
pub const DEFAULT_PORT: u16 = 6568;

/// Length of the truncated HMAC-SHA1 trailer.
pub const SIGNATURE_LEN: usize = 10;

/// Length of the random nonce in the report header.
pub const NONCE_LEN: usize = 8;

/// Longest username a report can carry, in bytes.
pub const MAX_USERNAME_LEN: usize = 63;

/// Reports smaller than this are held back unless data would be lost.
pub const MIN_REPORT_SIZE: usize = 400;

/// Reports whose timestamp is further than this from the aggregator's
/// clock are refused.
pub const FRESHNESS_WINDOW_SECS: u32 = 120;
