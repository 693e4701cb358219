//! Which addresses a sensor may report.
//!
//! IPv4 addresses must be globally routable unicast. IPv6 addresses must
//! be Aggregatable Global Unicast (2000::/3), excluding documentation
//! space.

use crate::error::{ProtocolError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Fail with [`ProtocolError::UnreportableAddress`] unless the address may
/// appear in a report.
pub fn check_reportable(address: IpAddr) -> Result<()> {
    if is_reportable(address) {
        Ok(())
    } else {
        Err(ProtocolError::UnreportableAddress(address))
    }
}

/// Whether the address may appear in a report.
pub fn is_reportable(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(v4) => is_reportable_v4(v4),
        IpAddr::V6(v6) => is_reportable_v6(v6),
    }
}

fn is_reportable_v4(address: Ipv4Addr) -> bool {
    let [a, b, c, _] = address.octets();

    let this_network = a == 0;
    let shared = a == 100 && (b & 0xc0) == 64;
    let ietf_protocol = a == 192 && b == 0 && c == 0;
    let benchmarking = a == 198 && (b & 0xfe) == 18;
    // 240/4, which also covers the limited broadcast address
    let reserved = a >= 240;

    !(this_network
        || address.is_private()
        || address.is_loopback()
        || address.is_link_local()
        || address.is_multicast()
        || address.is_broadcast()
        || address.is_documentation()
        || shared
        || ietf_protocol
        || benchmarking
        || reserved)
}

fn is_reportable_v6(address: Ipv6Addr) -> bool {
    let segments = address.segments();
    let global_unicast = (segments[0] & 0xe000) == 0x2000;
    let documentation = segments[0] == 0x2001 && segments[1] == 0x0db8;
    global_unicast && !documentation
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("5.79.73.204" ; "hosting provider")]
    #[test_case("95.211.160.147" ; "european range")]
    #[test_case("93.184.216.34" ; "example dot com")]
    #[test_case("8.8.8.8" ; "public resolver")]
    #[test_case("172.32.0.1" ; "just past rfc1918 block")]
    #[test_case("2606:2800:220:1:248:1893:25c8:1946" ; "global ipv6")]
    #[test_case("2a00:1450:4001:82b::200e" ; "another global ipv6")]
    fn test_reportable(addr: &str) {
        let addr: IpAddr = addr.parse().unwrap();
        assert!(is_reportable(addr));
        assert!(check_reportable(addr).is_ok());
    }

    #[test_case("0.0.0.0" ; "unspecified")]
    #[test_case("0.1.2.3" ; "this network")]
    #[test_case("10.1.2.3" ; "rfc1918 ten")]
    #[test_case("172.16.5.4" ; "rfc1918 172")]
    #[test_case("192.168.0.1" ; "rfc1918 192")]
    #[test_case("127.0.0.1" ; "loopback")]
    #[test_case("224.0.0.251" ; "multicast")]
    #[test_case("169.254.10.10" ; "link local")]
    #[test_case("100.64.0.1" ; "carrier grade nat")]
    #[test_case("192.0.0.8" ; "ietf protocol assignments")]
    #[test_case("192.0.2.1" ; "test net 1")]
    #[test_case("198.51.100.7" ; "test net 2")]
    #[test_case("203.0.113.9" ; "test net 3")]
    #[test_case("198.19.0.1" ; "benchmarking")]
    #[test_case("240.0.0.1" ; "reserved")]
    #[test_case("255.255.255.255" ; "broadcast")]
    #[test_case("::" ; "v6 unspecified")]
    #[test_case("::1" ; "v6 loopback")]
    #[test_case("ff02::1" ; "v6 multicast")]
    #[test_case("fe80::1" ; "v6 link local")]
    #[test_case("fec0::1" ; "v6 site local")]
    #[test_case("fd12:3456::1" ; "v6 unique local")]
    #[test_case("::ffff:8.8.8.8" ; "v4 mapped")]
    #[test_case("2001:db8::1" ; "v6 documentation")]
    fn test_not_reportable(addr: &str) {
        let addr: IpAddr = addr.parse().unwrap();
        assert!(!is_reportable(addr));
        assert_eq!(
            check_reportable(addr),
            Err(ProtocolError::UnreportableAddress(addr))
        );
    }
}
