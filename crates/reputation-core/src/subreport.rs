//! Subreport framing.
//!
//! A subreport is a format byte, a 16-bit big-endian content length and
//! the content. The end-of-report marker is the single byte 0 with no
//! length field.

use crate::error::{ProtocolError, Result};
use crate::event::{EventType, IpEvent, RepeatedIpEvent};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Subreport format codes.
pub mod format {
    pub const END_OF_REPORT: u8 = 0;
    pub const IPV4_EVENTS: u8 = 1;
    pub const IPV6_EVENTS: u8 = 2;
    pub const REPEATED_IPV4_EVENTS: u8 = 3;
    pub const REPEATED_IPV6_EVENTS: u8 = 4;
    pub const SOFTWARE_NAME: u8 = 6;
    pub const SOFTWARE_VERSION: u8 = 7;
    pub const END_USER: u8 = 8;
}

/// Size of one IPv4 event entry.
pub const IPV4_EVENT_LEN: usize = 5;
/// Size of one IPv6 event entry.
pub const IPV6_EVENT_LEN: usize = 17;
/// Size of one repeated IPv4 event entry.
pub const REPEATED_IPV4_EVENT_LEN: usize = 6;
/// Size of one repeated IPv6 event entry.
pub const REPEATED_IPV6_EVENT_LEN: usize = 18;

/// Longest software name, in bytes.
pub const MAX_SOFTWARE_NAME_LEN: usize = 63;
/// Longest software version, in bytes.
pub const MAX_SOFTWARE_VERSION_LEN: usize = 31;
/// Longest end-user identifier, in bytes.
pub const MAX_END_USER_LEN: usize = 31;

/// Preamble before subreport content: format byte plus length.
pub const PREAMBLE_LEN: usize = 3;

/// One decoded or to-be-encoded subreport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubReport {
    Ipv4Events(Vec<IpEvent>),
    Ipv6Events(Vec<IpEvent>),
    RepeatedIpv4Events(Vec<RepeatedIpEvent>),
    RepeatedIpv6Events(Vec<RepeatedIpEvent>),
    /// Name of the reporting software, UTF-8.
    SoftwareName(String),
    /// Version of the reporting software, US-ASCII.
    SoftwareVersion(String),
    /// Opaque identifier of the user behind the subreports that follow.
    EndUser(Bytes),
    /// A format this implementation does not understand. Skipped by
    /// aggregators, carried verbatim otherwise.
    Unknown { format: u8, content: Bytes },
}

impl SubReport {
    /// Software name subreport, 1 to 63 bytes.
    pub fn software_name(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_string_len("software name", name.len(), MAX_SOFTWARE_NAME_LEN)?;
        Ok(Self::SoftwareName(name))
    }

    /// Software version subreport, 1 to 31 US-ASCII bytes.
    pub fn software_version(version: impl Into<String>) -> Result<Self> {
        let version = version.into();
        check_string_len("software version", version.len(), MAX_SOFTWARE_VERSION_LEN)?;
        if !version.is_ascii() {
            return Err(ProtocolError::NonAsciiVersion);
        }
        Ok(Self::SoftwareVersion(version))
    }

    /// End-user subreport, 1 to 31 opaque bytes.
    pub fn end_user(id: impl Into<Bytes>) -> Result<Self> {
        let id = id.into();
        check_string_len("end user", id.len(), MAX_END_USER_LEN)?;
        Ok(Self::EndUser(id))
    }

    /// Wire format code.
    pub fn format(&self) -> u8 {
        match self {
            Self::Ipv4Events(_) => format::IPV4_EVENTS,
            Self::Ipv6Events(_) => format::IPV6_EVENTS,
            Self::RepeatedIpv4Events(_) => format::REPEATED_IPV4_EVENTS,
            Self::RepeatedIpv6Events(_) => format::REPEATED_IPV6_EVENTS,
            Self::SoftwareName(_) => format::SOFTWARE_NAME,
            Self::SoftwareVersion(_) => format::SOFTWARE_VERSION,
            Self::EndUser(_) => format::END_USER,
            Self::Unknown { format, .. } => *format,
        }
    }

    /// Whether this subreport carries events.
    pub fn is_events(&self) -> bool {
        matches!(
            self,
            Self::Ipv4Events(_)
                | Self::Ipv6Events(_)
                | Self::RepeatedIpv4Events(_)
                | Self::RepeatedIpv6Events(_)
        )
    }

    /// Number of content bytes, excluding the preamble.
    pub fn content_len(&self) -> usize {
        match self {
            Self::Ipv4Events(events) => events.len() * IPV4_EVENT_LEN,
            Self::Ipv6Events(events) => events.len() * IPV6_EVENT_LEN,
            Self::RepeatedIpv4Events(events) => events.len() * REPEATED_IPV4_EVENT_LEN,
            Self::RepeatedIpv6Events(events) => events.len() * REPEATED_IPV6_EVENT_LEN,
            Self::SoftwareName(name) => name.len(),
            Self::SoftwareVersion(version) => version.len(),
            Self::EndUser(id) => id.len(),
            Self::Unknown { content, .. } => content.len(),
        }
    }

    /// Total bytes this subreport occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        PREAMBLE_LEN + self.content_len()
    }

    /// Check the invariants that [`SubReport::encode`] relies on.
    pub fn validate(&self) -> Result<()> {
        let format = self.format();
        let length = self.content_len();
        if length > usize::from(u16::MAX) {
            return Err(ProtocolError::InvalidLength { format, length });
        }
        match self {
            Self::Ipv4Events(events) => check_events(format, events.iter().map(IpEvent::address), false),
            Self::Ipv6Events(events) => check_events(format, events.iter().map(IpEvent::address), true),
            Self::RepeatedIpv4Events(events) => {
                check_events(format, events.iter().map(RepeatedIpEvent::address), false)
            }
            Self::RepeatedIpv6Events(events) => {
                check_events(format, events.iter().map(RepeatedIpEvent::address), true)
            }
            Self::SoftwareName(name) => check_string_len("software name", name.len(), MAX_SOFTWARE_NAME_LEN),
            Self::SoftwareVersion(version) => {
                check_string_len("software version", version.len(), MAX_SOFTWARE_VERSION_LEN)?;
                if version.is_ascii() {
                    Ok(())
                } else {
                    Err(ProtocolError::NonAsciiVersion)
                }
            }
            Self::EndUser(id) => check_string_len("end user", id.len(), MAX_END_USER_LEN),
            Self::Unknown { .. } => Ok(()),
        }
    }

    /// Append the preamble and content to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.validate()?;
        buf.reserve(self.encoded_len());
        buf.put_u8(self.format());
        buf.put_u16(self.content_len() as u16);
        match self {
            Self::Ipv4Events(events) | Self::Ipv6Events(events) => {
                for event in events {
                    put_address(buf, event.address());
                    buf.put_u8(event.event().code());
                }
            }
            Self::RepeatedIpv4Events(events) | Self::RepeatedIpv6Events(events) => {
                for event in events {
                    put_address(buf, event.address());
                    buf.put_u8(event.event().code());
                    buf.put_u8(event.repeat());
                }
            }
            Self::SoftwareName(value) | Self::SoftwareVersion(value) => buf.put_slice(value.as_bytes()),
            Self::EndUser(id) => buf.put_slice(id),
            Self::Unknown { content, .. } => buf.put_slice(content),
        }
        Ok(())
    }

    /// Decode the content of one subreport whose preamble has been read.
    pub fn decode(format: u8, content: &[u8]) -> Result<Self> {
        match format {
            format::IPV4_EVENTS => decode_entries(format, content, IPV4_EVENT_LEN, |entry| {
                IpEvent::new(read_v4(entry), EventType::from_code(entry[4])?)
            })
            .map(Self::Ipv4Events),
            format::IPV6_EVENTS => decode_entries(format, content, IPV6_EVENT_LEN, |entry| {
                IpEvent::new(read_v6(entry), EventType::from_code(entry[16])?)
            })
            .map(Self::Ipv6Events),
            format::REPEATED_IPV4_EVENTS => {
                decode_entries(format, content, REPEATED_IPV4_EVENT_LEN, |entry| {
                    RepeatedIpEvent::new(read_v4(entry), EventType::from_code(entry[4])?, entry[5])
                })
                .map(Self::RepeatedIpv4Events)
            }
            format::REPEATED_IPV6_EVENTS => {
                decode_entries(format, content, REPEATED_IPV6_EVENT_LEN, |entry| {
                    RepeatedIpEvent::new(read_v6(entry), EventType::from_code(entry[16])?, entry[17])
                })
                .map(Self::RepeatedIpv6Events)
            }
            format::SOFTWARE_NAME => {
                let name = std::str::from_utf8(content)
                    .map_err(|_| ProtocolError::InvalidUtf8("software name"))?;
                Self::software_name(name)
            }
            format::SOFTWARE_VERSION => {
                if !content.is_ascii() {
                    return Err(ProtocolError::NonAsciiVersion);
                }
                let version = std::str::from_utf8(content)
                    .map_err(|_| ProtocolError::InvalidUtf8("software version"))?;
                Self::software_version(version)
            }
            format::END_USER => Self::end_user(Bytes::copy_from_slice(content)),
            _ => Ok(Self::Unknown {
                format,
                content: Bytes::copy_from_slice(content),
            }),
        }
    }
}

/// Decode a subreport stream up to and including the end-of-report marker.
///
/// A stream that ends exactly on a subreport boundary without the marker
/// is accepted. Bytes after the marker are an error.
pub fn decode_stream(mut buf: &[u8]) -> Result<Vec<SubReport>> {
    let mut subreports = Vec::new();
    while buf.has_remaining() {
        let format = buf.get_u8();
        if format == format::END_OF_REPORT {
            if buf.has_remaining() {
                return Err(ProtocolError::TrailingData(buf.remaining()));
            }
            break;
        }
        if buf.remaining() < 2 {
            return Err(ProtocolError::Truncated {
                what: "subreport length",
                needed: 2,
                available: buf.remaining(),
            });
        }
        let length = usize::from(buf.get_u16());
        if buf.remaining() < length {
            return Err(ProtocolError::Truncated {
                what: "subreport content",
                needed: length,
                available: buf.remaining(),
            });
        }
        let (content, rest) = buf.split_at(length);
        subreports.push(SubReport::decode(format, content)?);
        buf = rest;
    }
    Ok(subreports)
}

/// Pack events into as few subreports as the length field allows,
/// separated by address family.
pub fn group_events(single: &[IpEvent], repeated: &[RepeatedIpEvent]) -> Vec<SubReport> {
    let (v4, v6): (Vec<IpEvent>, Vec<IpEvent>) = single.iter().copied().partition(|e| e.address().is_ipv4());
    let (rv4, rv6): (Vec<RepeatedIpEvent>, Vec<RepeatedIpEvent>) =
        repeated.iter().copied().partition(|e| e.address().is_ipv4());

    let mut subreports = Vec::new();
    push_chunks(&mut subreports, v4, IPV4_EVENT_LEN, SubReport::Ipv4Events);
    push_chunks(&mut subreports, rv4, REPEATED_IPV4_EVENT_LEN, SubReport::RepeatedIpv4Events);
    push_chunks(&mut subreports, v6, IPV6_EVENT_LEN, SubReport::Ipv6Events);
    push_chunks(&mut subreports, rv6, REPEATED_IPV6_EVENT_LEN, SubReport::RepeatedIpv6Events);
    subreports
}

fn push_chunks<T: Clone>(
    out: &mut Vec<SubReport>,
    events: Vec<T>,
    entry_len: usize,
    wrap: fn(Vec<T>) -> SubReport,
) {
    let per_subreport = usize::from(u16::MAX) / entry_len;
    for chunk in events.chunks(per_subreport) {
        out.push(wrap(chunk.to_vec()));
    }
}

fn check_string_len(kind: &'static str, len: usize, max: usize) -> Result<()> {
    if len == 0 || len > max {
        return Err(ProtocolError::InvalidStringLength { kind, max, len });
    }
    Ok(())
}

fn check_events(format: u8, mut addresses: impl Iterator<Item = IpAddr>, v6: bool) -> Result<()> {
    let mut empty = true;
    let mixed = addresses.any(|addr| {
        empty = false;
        addr.is_ipv6() != v6
    });
    if mixed {
        return Err(ProtocolError::MixedFamilies(format));
    }
    if empty {
        return Err(ProtocolError::InvalidLength { format, length: 0 });
    }
    Ok(())
}

fn decode_entries<T>(
    format: u8,
    content: &[u8],
    entry_len: usize,
    decode: impl Fn(&[u8]) -> Result<T>,
) -> Result<Vec<T>> {
    if content.is_empty() || content.len() % entry_len != 0 {
        return Err(ProtocolError::InvalidLength {
            format,
            length: content.len(),
        });
    }
    content.chunks_exact(entry_len).map(decode).collect()
}

fn put_address(buf: &mut BytesMut, address: IpAddr) {
    match address {
        IpAddr::V4(v4) => buf.put_slice(&v4.octets()),
        IpAddr::V6(v6) => buf.put_slice(&v6.octets()),
    }
}

fn read_v4(entry: &[u8]) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(entry[0], entry[1], entry[2], entry[3]))
}

fn read_v6(entry: &[u8]) -> IpAddr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&entry[..16]);
    IpAddr::V6(Ipv6Addr::from(octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4_event(addr: &str, event: EventType) -> IpEvent {
        IpEvent::new(addr.parse().unwrap(), event).unwrap()
    }

    #[test]
    fn test_ipv4_events_encoding() {
        let sub = SubReport::Ipv4Events(vec![
            v4_event("5.79.73.204", EventType::AutoSpam),
            v4_event("95.211.160.147", EventType::Greylisted),
        ]);
        let mut buf = BytesMut::new();
        sub.encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[1, 0, 10, 5, 79, 73, 204, 3, 95, 211, 160, 147, 1]
        );
        assert_eq!(sub.encoded_len(), buf.len());
    }

    #[test]
    fn test_repeated_entry_is_event_then_repeat() {
        let event = RepeatedIpEvent::new("93.184.216.34".parse().unwrap(), EventType::InvalidRecipient, 3).unwrap();
        let mut buf = BytesMut::new();
        SubReport::RepeatedIpv4Events(vec![event]).encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[3, 0, 6, 93, 184, 216, 34, 8, 3]);

        let decoded = decode_stream(&buf).unwrap();
        assert_eq!(decoded, vec![SubReport::RepeatedIpv4Events(vec![event])]);
    }

    #[test]
    fn test_string_limits() {
        assert!(SubReport::software_name("x".repeat(63)).is_ok());
        assert!(matches!(
            SubReport::software_name("x".repeat(64)),
            Err(ProtocolError::InvalidStringLength { max: 63, len: 64, .. })
        ));
        assert!(matches!(
            SubReport::software_name(""),
            Err(ProtocolError::InvalidStringLength { len: 0, .. })
        ));
        assert!(SubReport::software_version("1.2.3").is_ok());
        assert_eq!(
            SubReport::software_version("1.0-\u{e9}"),
            Err(ProtocolError::NonAsciiVersion)
        );
        assert!(SubReport::end_user(vec![0xffu8; 31]).is_ok());
        assert!(SubReport::end_user(vec![0u8; 32]).is_err());
    }

    #[test]
    fn test_string_subreport_uses_two_byte_length() {
        let mut buf = BytesMut::new();
        SubReport::software_name("mta").unwrap().encode(&mut buf).unwrap();
        assert_eq!(&buf[..], b"\x06\x00\x03mta");
    }

    #[test]
    fn test_mixed_families_rejected() {
        let sub = SubReport::Ipv4Events(vec![IpEvent::new(
            "2606:2800:220:1:248:1893:25c8:1946".parse().unwrap(),
            EventType::Virus,
        )
        .unwrap()]);
        let mut buf = BytesMut::new();
        assert_eq!(sub.encode(&mut buf), Err(ProtocolError::MixedFamilies(1)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_event_list_rejected() {
        let mut buf = BytesMut::new();
        assert_eq!(
            SubReport::Ipv6Events(Vec::new()).encode(&mut buf),
            Err(ProtocolError::InvalidLength { format: 2, length: 0 })
        );
    }

    #[test]
    fn test_decode_rejects_partial_entry() {
        let bytes = [1, 0, 6, 5, 79, 73, 204, 3, 0];
        assert_eq!(
            decode_stream(&bytes),
            Err(ProtocolError::InvalidLength { format: 1, length: 6 })
        );
    }

    #[test]
    fn test_decode_rejects_reserved_event() {
        let bytes = [1, 0, 5, 5, 79, 73, 204, 0, 0];
        assert_eq!(decode_stream(&bytes), Err(ProtocolError::ReservedEvent));
    }

    #[test]
    fn test_decode_rejects_unreportable_address() {
        let bytes = [1, 0, 5, 10, 0, 0, 1, 3, 0];
        assert!(matches!(
            decode_stream(&bytes),
            Err(ProtocolError::UnreportableAddress(_))
        ));
    }

    #[test]
    fn test_decode_skips_unknown_format() {
        let bytes = [9, 0, 2, 0xaa, 0xbb, 1, 0, 5, 5, 79, 73, 204, 3, 0];
        let decoded = decode_stream(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded[0],
            SubReport::Unknown {
                format: 9,
                content: Bytes::from_static(&[0xaa, 0xbb])
            }
        );
        assert!(decoded[1].is_events());
    }

    #[test]
    fn test_decode_without_end_marker() {
        let bytes = [1, 0, 5, 5, 79, 73, 204, 3];
        assert_eq!(decode_stream(&bytes).unwrap().len(), 1);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let bytes = [1, 0, 5, 5, 79, 73, 204, 3, 0, 7];
        assert_eq!(decode_stream(&bytes), Err(ProtocolError::TrailingData(1)));
    }

    #[test]
    fn test_decode_truncated_content() {
        let bytes = [1, 0, 10, 5, 79, 73, 204, 3];
        assert!(matches!(
            decode_stream(&bytes),
            Err(ProtocolError::Truncated { needed: 10, available: 5, .. })
        ));
    }

    #[test]
    fn test_group_events_splits_families_and_chunks() {
        let many: Vec<IpEvent> = (0..14_000u32)
            .map(|i| {
                let [_, b, c, d] = i.to_be_bytes();
                IpEvent::new(IpAddr::V4(Ipv4Addr::new(5, b, c, d)), EventType::AutoSpam).unwrap()
            })
            .collect();
        let mut single = many.clone();
        single.push(IpEvent::new("2a00:1450::1".parse().unwrap(), EventType::Virus).unwrap());

        let grouped = group_events(&single, &[]);
        // 65535 / 5 = 13107 IPv4 entries per subreport
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].content_len(), 13107 * IPV4_EVENT_LEN);
        assert_eq!(grouped[1].content_len(), (14_000 - 13107) * IPV4_EVENT_LEN);
        assert_eq!(grouped[2].format(), format::IPV6_EVENTS);
        for sub in &grouped {
            assert!(sub.validate().is_ok());
        }
    }
}
