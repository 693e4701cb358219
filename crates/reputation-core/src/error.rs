//! Protocol error types.

use std::net::IpAddr;
use thiserror::Error;

/// Everything that can go wrong building or reading a report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The address is not globally routable unicast.
    #[error("address {0} is not reportable")]
    UnreportableAddress(IpAddr),

    /// Event type 0 appeared in a report.
    #[error("event type 0 is reserved")]
    ReservedEvent,

    /// An event code outside the known table.
    #[error("unknown event type: {0}")]
    UnknownEvent(u8),

    /// An event name that does not match any event type.
    #[error("unknown event name: {0}")]
    UnknownEventName(String),

    /// Repeated events must carry a count of two or more.
    #[error("repeat count must be at least 2, got {0}")]
    InvalidRepeat(u8),

    /// A string subreport outside its permitted length.
    #[error("{kind} must be 1 to {max} bytes, got {len}")]
    InvalidStringLength {
        kind: &'static str,
        max: usize,
        len: usize,
    },

    /// A UTF-8 field failed to decode.
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// The software version contains non US-ASCII bytes.
    #[error("software version must be US-ASCII")]
    NonAsciiVersion,

    #[error("username is {0} bytes, maximum is 63")]
    UsernameTooLong(usize),

    /// The datagram ended early.
    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// A subreport length that does not fit its format.
    #[error("subreport format {format} has invalid length {length}")]
    InvalidLength { format: u8, length: usize },

    /// IPv4 and IPv6 events mixed in one subreport.
    #[error("subreport format {0} mixes address families")]
    MixedFamilies(u8),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("signature mismatch")]
    BadSignature,

    /// The shared secret cannot key an HMAC.
    #[error("invalid signing key")]
    InvalidKey,

    /// A report without any content subreport.
    #[error("report contains no subreports")]
    EmptyReport,

    #[error("duplicate {0} subreport")]
    DuplicateSubreport(&'static str),

    #[error("software version subreport requires a software name subreport")]
    VersionWithoutName,

    /// Bytes following the end-of-report marker.
    #[error("{0} trailing bytes after end of report")]
    TrailingData(usize),
}

/// Result type alias using [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;
