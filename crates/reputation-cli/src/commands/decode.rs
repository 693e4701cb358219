//! Decode command implementation.

use std::net::IpAddr;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use reputation_core::{EventType, SignedReport, SubReport, PROTOCOL_VERSION};
use serde::Serialize;

use crate::args::parse_hex;
use crate::cli::CommandContext;
use crate::error::CliError;

/// Decode a captured report datagram and print it as JSON
#[derive(Debug, Parser)]
pub struct DecodeCommand {
    /// File holding one datagram
    file: PathBuf,

    /// The file holds hex text instead of raw bytes
    #[arg(long)]
    hex: bool,

    /// Shared secret used to check the signature
    #[arg(long, env = "REPUTATION_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

/// JSON view of a report.
#[derive(Debug, Serialize)]
pub struct DecodedReport {
    pub version: u8,
    pub username: String,
    pub nonce: String,
    pub timestamp: u32,
    /// Timestamp read as seconds since the Unix epoch.
    pub time: Option<DateTime<Utc>>,
    pub signature: String,
    /// Present only when a password was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_valid: Option<bool>,
    pub length: usize,
    pub subreports: Vec<DecodedSubreport>,
}

/// JSON view of one subreport.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodedSubreport {
    Events {
        format: u8,
        events: Vec<DecodedEvent>,
    },
    SoftwareName {
        value: String,
    },
    SoftwareVersion {
        value: String,
    },
    EndUser {
        hex: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Unknown {
        format: u8,
        length: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct DecodedEvent {
    pub address: IpAddr,
    pub event: EventType,
    pub code: u8,
    pub repeat: u8,
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl From<SubReport> for DecodedSubreport {
    fn from(subreport: SubReport) -> Self {
        let format = subreport.format();
        let single = |address, event: EventType| DecodedEvent {
            address,
            event,
            code: event.code(),
            repeat: 1,
        };
        match subreport {
            SubReport::Ipv4Events(events) | SubReport::Ipv6Events(events) => Self::Events {
                format,
                events: events
                    .iter()
                    .map(|e| single(e.address(), e.event()))
                    .collect(),
            },
            SubReport::RepeatedIpv4Events(events) | SubReport::RepeatedIpv6Events(events) => {
                Self::Events {
                    format,
                    events: events
                        .iter()
                        .map(|e| DecodedEvent {
                            repeat: e.repeat(),
                            ..single(e.address(), e.event())
                        })
                        .collect(),
                }
            }
            SubReport::SoftwareName(value) => Self::SoftwareName { value },
            SubReport::SoftwareVersion(value) => Self::SoftwareVersion { value },
            SubReport::EndUser(id) => Self::EndUser {
                hex: to_hex(&id),
                text: std::str::from_utf8(&id).ok().map(str::to_string),
            },
            SubReport::Unknown { format, content } => Self::Unknown {
                format,
                length: content.len(),
            },
        }
    }
}

/// Decode one datagram.
pub fn decode_datagram(datagram: &[u8], password: Option<&str>) -> Result<DecodedReport, CliError> {
    let report = SignedReport::parse(datagram)?;
    let signature_valid = password.map(|p| report.verify(p.as_bytes()).is_ok());
    let subreports = report
        .subreports()?
        .into_iter()
        .map(DecodedSubreport::from)
        .collect();

    Ok(DecodedReport {
        version: PROTOCOL_VERSION,
        username: report.username().to_string(),
        nonce: to_hex(&report.nonce()),
        timestamp: report.timestamp(),
        time: DateTime::from_timestamp(i64::from(report.timestamp()), 0),
        signature: to_hex(report.signature()),
        signature_valid,
        length: datagram.len(),
        subreports,
    })
}

impl DecodeCommand {
    fn read(&self) -> Result<Vec<u8>, CliError> {
        let contents = std::fs::read(&self.file)
            .map_err(|e| CliError::io_with_path("failed to read datagram", e, &self.file))?;
        if !self.hex {
            return Ok(contents);
        }
        let text = String::from_utf8(contents)
            .map_err(|_| CliError::usage("hex input is not valid text"))?;
        parse_hex(&text).map_err(|e| {
            CliError::usage_with_hint(e, "omit --hex to read the file as raw bytes")
        })
    }

    pub async fn execute(&self, _ctx: &CommandContext) -> Result<(), CliError> {
        let datagram = self.read()?;
        let decoded = decode_datagram(&datagram, self.password.as_deref())?;
        let json = serde_json::to_string_pretty(&decoded).map_err(|e| CliError::Other(e.into()))?;
        println!("{json}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reputation_core::ProtocolError;
    use reputation_test_utils::{from_hex, GOLDEN_EVENTS_HEX, GOLDEN_METADATA_HEX};

    #[test]
    fn test_decode_golden_events() {
        let decoded = decode_datagram(&from_hex(GOLDEN_EVENTS_HEX), Some("foo")).unwrap();
        assert_eq!(decoded.username, "dfs");
        assert_eq!(decoded.nonce, "0101010101010101");
        assert_eq!(decoded.signature_valid, Some(true));
        assert_eq!(decoded.length, 70);

        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json["subreports"][0]["type"], "events");
        assert_eq!(json["subreports"][0]["events"][0]["address"], "5.79.73.204");
        assert_eq!(json["subreports"][0]["events"][0]["event"], "AUTO-SPAM");
        assert_eq!(json["time"], "2006-08-28T01:18:00Z");
    }

    #[test]
    fn test_decode_metadata() {
        let decoded = decode_datagram(&from_hex(GOLDEN_METADATA_HEX), None).unwrap();
        assert!(decoded.signature_valid.is_none());
        let json = serde_json::to_value(&decoded).unwrap();
        assert!(json.get("signature_valid").is_none());
        assert_eq!(json["subreports"][0]["type"], "software_name");
        assert_eq!(json["subreports"][0]["value"], "postfix-rep");
        assert_eq!(json["subreports"][1]["value"], "1.0");
    }

    #[test]
    fn test_wrong_password_reports_invalid() {
        let decoded = decode_datagram(&from_hex(GOLDEN_EVENTS_HEX), Some("bar")).unwrap();
        assert_eq!(decoded.signature_valid, Some(false));
    }

    #[test]
    fn test_short_datagram_is_protocol_error() {
        let err = decode_datagram(&[2, 0, 1], None).unwrap_err();
        assert!(matches!(err, CliError::Protocol(ProtocolError::Truncated { .. })));
    }
}
