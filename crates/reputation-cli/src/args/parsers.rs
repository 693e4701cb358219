//! Custom value parsers for CLI arguments.

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use reputation_core::{check_reportable, EventType};

/// One `EVENT,ADDRESS[,COUNT]` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSpec {
    pub event: EventType,
    pub address: IpAddr,
    pub count: u32,
}

impl FromStr for EventSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_event_spec(s)
    }
}

/// Parse `EVENT,ADDRESS[,COUNT]`. The event may be given by name or code.
pub fn parse_event_spec(s: &str) -> Result<EventSpec, String> {
    let mut parts = s.split(',').map(str::trim);
    let (event, address) = match (parts.next(), parts.next()) {
        (Some(event), Some(address)) if !event.is_empty() && !address.is_empty() => {
            (event, address)
        }
        _ => return Err(format!("Expected EVENT,ADDRESS[,COUNT]: {s}")),
    };
    let count = match parts.next() {
        Some(count) => count
            .parse::<u32>()
            .ok()
            .filter(|&c| c > 0)
            .ok_or_else(|| format!("Invalid count: {count}"))?,
        None => 1,
    };
    if parts.next().is_some() {
        return Err(format!("Too many fields: {s}"));
    }

    let event = match event.parse::<u8>() {
        Ok(code) => EventType::from_code(code).map_err(|e| e.to_string())?,
        Err(_) => event.parse::<EventType>().map_err(|e| e.to_string())?,
    };
    let address: IpAddr = address
        .parse()
        .map_err(|_| format!("Invalid IP address: {address}"))?;
    check_reportable(address).map_err(|e| e.to_string())?;

    Ok(EventSpec {
        event,
        address,
        count,
    })
}

/// Parse a timeout given in milliseconds
pub fn parse_timeout_ms(s: &str) -> Result<Duration, String> {
    let millis: u64 = s
        .parse()
        .map_err(|_| format!("Invalid timeout: {s}"))?;
    if millis == 0 {
        return Err("Timeout must be positive".to_string());
    }
    Ok(Duration::from_millis(millis))
}

/// Decode hex text, ignoring whitespace
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("Hex input has an odd number of digits".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|_| "Invalid hex digit".to_string())?;
            u8::from_str_radix(text, 16).map_err(|_| format!("Invalid hex byte: {text}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("AUTO-SPAM,5.79.73.204", EventType::AutoSpam, "5.79.73.204", 1 ; "by name")]
    #[test_case("auto_spam,5.79.73.204", EventType::AutoSpam, "5.79.73.204", 1 ; "loose name")]
    #[test_case("3,5.79.73.204,7", EventType::AutoSpam, "5.79.73.204", 7 ; "by code with count")]
    #[test_case("PHISH, 2606:2800:220:1:248:1893:25c8:1946", EventType::Phish, "2606:2800:220:1:248:1893:25c8:1946", 1 ; "ipv6 with spaces")]
    fn test_parse_event_spec(input: &str, event: EventType, address: &str, count: u32) {
        let spec = parse_event_spec(input).unwrap();
        assert_eq!(spec.event, event);
        assert_eq!(spec.address, address.parse::<IpAddr>().unwrap());
        assert_eq!(spec.count, count);
    }

    #[test_case("AUTO-SPAM" ; "missing address")]
    #[test_case("AUTO-SPAM,5.79.73.204,0" ; "zero count")]
    #[test_case("AUTO-SPAM,5.79.73.204,1,2" ; "extra field")]
    #[test_case("NOT-AN-EVENT,5.79.73.204" ; "unknown name")]
    #[test_case("0,5.79.73.204" ; "reserved code")]
    #[test_case("AUTO-SPAM,10.1.2.3" ; "private address")]
    #[test_case("AUTO-SPAM,nonsense" ; "bad address")]
    fn test_parse_event_spec_rejects(input: &str) {
        assert!(parse_event_spec(input).is_err());
    }

    #[test]
    fn test_parse_timeout_ms() {
        assert_eq!(parse_timeout_ms("250").unwrap(), Duration::from_millis(250));
        assert!(parse_timeout_ms("0").is_err());
        assert!(parse_timeout_ms("soon").is_err());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("02 03\n6466").unwrap(), vec![2, 3, 0x64, 0x66]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
