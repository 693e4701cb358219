//! Report framing and signing.

use crate::error::{ProtocolError, Result};
use crate::signature;
use crate::subreport::{self, format, SubReport};
use crate::{MAX_USERNAME_LEN, NONCE_LEN, PROTOCOL_VERSION, SIGNATURE_LEN};
use bytes::{BufMut, Bytes, BytesMut};

/// Header bytes that follow the username: nonce plus timestamp.
const NONCE_AND_TIMESTAMP_LEN: usize = NONCE_LEN + 4;

/// Current Unix time in seconds, truncated to the low 32 bits.
pub fn unix_timestamp() -> u32 {
    chrono::Utc::now().timestamp() as u32
}

/// A report ready to be signed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    username: String,
    nonce: [u8; NONCE_LEN],
    timestamp: u32,
    subreports: Vec<SubReport>,
}

impl Report {
    /// Create a report stamped with a fresh random nonce and the current time.
    pub fn new(username: impl Into<String>, subreports: Vec<SubReport>) -> Self {
        Self::with_header(username, rand::random(), unix_timestamp(), subreports)
    }

    /// Create a report with an explicit nonce and timestamp.
    pub fn with_header(
        username: impl Into<String>,
        nonce: [u8; NONCE_LEN],
        timestamp: u32,
        subreports: Vec<SubReport>,
    ) -> Self {
        Self {
            username: username.into(),
            nonce,
            timestamp,
            subreports,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        self.nonce
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn subreports(&self) -> &[SubReport] {
        &self.subreports
    }

    /// Check the rules a sensor must follow before sending.
    pub fn validate(&self) -> Result<()> {
        if self.username.len() > MAX_USERNAME_LEN {
            return Err(ProtocolError::UsernameTooLong(self.username.len()));
        }
        if self.subreports.is_empty() {
            return Err(ProtocolError::EmptyReport);
        }

        let count = |fmt: u8| self.subreports.iter().filter(|s| s.format() == fmt).count();
        let names = count(format::SOFTWARE_NAME);
        let versions = count(format::SOFTWARE_VERSION);
        if names > 1 {
            return Err(ProtocolError::DuplicateSubreport("software name"));
        }
        if versions > 1 {
            return Err(ProtocolError::DuplicateSubreport("software version"));
        }
        if versions == 1 && names == 0 {
            return Err(ProtocolError::VersionWithoutName);
        }

        self.subreports.iter().try_for_each(SubReport::validate)
    }

    /// Size of the signed datagram.
    pub fn encoded_len(&self) -> usize {
        2 + self.username.len()
            + NONCE_AND_TIMESTAMP_LEN
            + self.subreports.iter().map(SubReport::encoded_len).sum::<usize>()
            + 1
            + SIGNATURE_LEN
    }

    /// Validate, then serialize and sign the report.
    pub fn encode(&self, secret: &[u8]) -> Result<Bytes> {
        self.validate()?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.username.len() as u8);
        buf.put_slice(self.username.as_bytes());
        buf.put_slice(&self.nonce);
        buf.put_u32(self.timestamp);
        for subreport in &self.subreports {
            subreport.encode(&mut buf)?;
        }
        buf.put_u8(format::END_OF_REPORT);

        let signature = signature::sign(secret, &buf)?;
        buf.put_slice(&signature);
        Ok(buf.freeze())
    }
}

/// A received datagram split into its fields. Nothing beyond the framing
/// has been checked: call [`SignedReport::verify`] before trusting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedReport<'a> {
    username: &'a str,
    nonce: [u8; NONCE_LEN],
    timestamp: u32,
    signed: &'a [u8],
    body: &'a [u8],
    signature: &'a [u8],
}

impl<'a> SignedReport<'a> {
    /// Split a datagram into header, subreport body and signature.
    pub fn parse(datagram: &'a [u8]) -> Result<Self> {
        let minimum = 2 + NONCE_AND_TIMESTAMP_LEN + SIGNATURE_LEN;
        if datagram.len() < minimum {
            return Err(ProtocolError::Truncated {
                what: "report",
                needed: minimum,
                available: datagram.len(),
            });
        }

        let version = datagram[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let username_len = usize::from(datagram[1]);
        if username_len > MAX_USERNAME_LEN {
            return Err(ProtocolError::UsernameTooLong(username_len));
        }
        let needed = minimum + username_len;
        if datagram.len() < needed {
            return Err(ProtocolError::Truncated {
                what: "report header",
                needed,
                available: datagram.len(),
            });
        }

        let (signed, signature) = datagram.split_at(datagram.len() - SIGNATURE_LEN);
        let username = std::str::from_utf8(&signed[2..2 + username_len])
            .map_err(|_| ProtocolError::InvalidUtf8("username"))?;
        let header_end = 2 + username_len;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&signed[header_end..header_end + NONCE_LEN]);
        let ts_start = header_end + NONCE_LEN;
        let timestamp = u32::from_be_bytes([
            signed[ts_start],
            signed[ts_start + 1],
            signed[ts_start + 2],
            signed[ts_start + 3],
        ]);

        Ok(Self {
            username,
            nonce,
            timestamp,
            signed,
            body: &signed[ts_start + 4..],
            signature,
        })
    }

    pub fn username(&self) -> &'a str {
        self.username
    }

    pub fn nonce(&self) -> [u8; NONCE_LEN] {
        self.nonce
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Raw subreport bytes, including the end-of-report marker if present.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// The ten signature bytes as received.
    pub fn signature(&self) -> &'a [u8] {
        self.signature
    }

    /// Whether the body carries nothing beyond an end-of-report marker.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() || self.body == [format::END_OF_REPORT]
    }

    /// Check the signature against the user's shared secret.
    pub fn verify(&self, secret: &[u8]) -> Result<()> {
        signature::verify(secret, self.signed, self.signature)
    }

    /// Decode the subreport stream.
    pub fn subreports(&self) -> Result<Vec<SubReport>> {
        subreport::decode_stream(self.body)
    }
}
