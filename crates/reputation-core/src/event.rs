//! Event types and the per-address event records carried in subreports.

use crate::address::check_reportable;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// What a sensor observed about an SMTP client.
///
/// Code 0 is reserved and has no variant: it can never be reported or
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    /// The client was greylisted.
    #[serde(rename = "GREYLISTED")]
    Greylisted = 1,
    /// A previously greylisted client passed the greylisting test.
    #[serde(rename = "UNGREYLISTED")]
    Ungreylisted = 2,
    /// Automatic filtering judged a message spam.
    #[serde(rename = "AUTO-SPAM")]
    AutoSpam = 3,
    /// A human judged a message spam.
    #[serde(rename = "HAND-SPAM")]
    HandSpam = 4,
    /// Automatic filtering judged a message non-spam.
    #[serde(rename = "AUTO-HAM")]
    AutoHam = 5,
    /// A human judged a message non-spam.
    #[serde(rename = "HAND-HAM")]
    HandHam = 6,
    /// RCPT named a valid recipient.
    #[serde(rename = "VALID-RECIPIENT")]
    ValidRecipient = 7,
    /// RCPT named an invalid recipient.
    #[serde(rename = "INVALID-RECIPIENT")]
    InvalidRecipient = 8,
    /// A message carried a virus.
    #[serde(rename = "VIRUS")]
    Virus = 9,
    /// A message was a phishing attempt. Non-standard.
    #[serde(rename = "PHISH")]
    Phish = 10,
    /// SMTP AUTH failed with invalid credentials. Non-standard.
    #[serde(rename = "AUTH-FAILED")]
    AuthFailed = 11,
}

impl EventType {
    /// Every reportable event type, in code order.
    pub const ALL: [EventType; 11] = [
        Self::Greylisted,
        Self::Ungreylisted,
        Self::AutoSpam,
        Self::HandSpam,
        Self::AutoHam,
        Self::HandHam,
        Self::ValidRecipient,
        Self::InvalidRecipient,
        Self::Virus,
        Self::Phish,
        Self::AuthFailed,
    ];

    /// The one-byte wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up an event type by wire code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Err(ProtocolError::ReservedEvent),
            1..=11 => Ok(Self::ALL[usize::from(code) - 1]),
            _ => Err(ProtocolError::UnknownEvent(code)),
        }
    }

    /// Canonical upper-case name, e.g. `AUTO-SPAM`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Greylisted => "GREYLISTED",
            Self::Ungreylisted => "UNGREYLISTED",
            Self::AutoSpam => "AUTO-SPAM",
            Self::HandSpam => "HAND-SPAM",
            Self::AutoHam => "AUTO-HAM",
            Self::HandHam => "HAND-HAM",
            Self::ValidRecipient => "VALID-RECIPIENT",
            Self::InvalidRecipient => "INVALID-RECIPIENT",
            Self::Virus => "VIRUS",
            Self::Phish => "PHISH",
            Self::AuthFailed => "AUTH-FAILED",
        }
    }

    /// Whether the event type is part of the published table.
    pub fn is_standard(self) -> bool {
        !matches!(self, Self::Phish | Self::AuthFailed)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|event| event.name() == normalized)
            .ok_or_else(|| ProtocolError::UnknownEventName(s.to_string()))
    }
}

impl TryFrom<u8> for EventType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}

/// A single occurrence of an event for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IpEvent {
    address: IpAddr,
    event: EventType,
}

impl IpEvent {
    /// Create an event, refusing addresses that must not be reported.
    pub fn new(address: IpAddr, event: EventType) -> Result<Self> {
        check_reportable(address)?;
        Ok(Self { address, event })
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn event(&self) -> EventType {
        self.event
    }
}

/// Several occurrences of the same event for the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RepeatedIpEvent {
    address: IpAddr,
    event: EventType,
    repeat: u8,
}

impl RepeatedIpEvent {
    /// Create a repeated event. `repeat` must be at least 2.
    pub fn new(address: IpAddr, event: EventType, repeat: u8) -> Result<Self> {
        check_reportable(address)?;
        if repeat < 2 {
            return Err(ProtocolError::InvalidRepeat(repeat));
        }
        Ok(Self {
            address,
            event,
            repeat,
        })
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn event(&self) -> EventType {
        self.event
    }

    pub fn repeat(&self) -> u8 {
        self.repeat
    }
}
