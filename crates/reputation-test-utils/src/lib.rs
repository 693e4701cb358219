//! Test utilities for the reputation crates.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UdpSocket;

/// Username of the golden reports.
pub const GOLDEN_USER: &str = "dfs";
/// Shared secret of the golden reports.
pub const GOLDEN_SECRET: &str = "foo";
/// Nonce of the golden reports.
pub const GOLDEN_NONCE: [u8; 8] = [1; 8];
/// Timestamp of the golden reports (2006-08-28T01:18:00Z).
pub const GOLDEN_TIMESTAMP: u32 = 1_156_727_880;

/// Report from `dfs` signed with `foo` carrying:
/// IPv4 events 5.79.73.204 AUTO-SPAM and 95.211.160.147 GREYLISTED,
/// repeated IPv4 event 93.184.216.34 INVALID-RECIPIENT x3 and
/// IPv6 event 2606:2800:220:1:248:1893:25c8:1946 VALID-RECIPIENT.
pub const GOLDEN_EVENTS_HEX: &str = "0203646673010101010101010144f2444801000a054f49cc035fd3a093\
010300065db8d822080302001126062800022000010248189325c819460700a7e94373f0dd306564dd";

/// Report from `dfs` signed with `foo` carrying software name
/// `postfix-rep`, version `1.0` and IPv4 event 5.79.73.204 AUTO-SPAM.
pub const GOLDEN_METADATA_HEX: &str = "0203646673010101010101010144f2444806000b706f73746669782d726570\
070003312e30010005054f49cc030026b39e63b4c8643ccf32";

/// Decode a hex string, ignoring ASCII whitespace.
pub fn from_hex(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    assert!(digits.len() % 2 == 0, "odd number of hex digits");
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).expect("hex digits are ASCII");
            u8::from_str_radix(text, 16).expect("invalid hex digit")
        })
        .collect()
}

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a temporary file with given content.
pub fn temp_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write temp file");
    (dir, path)
}

/// A UDP socket bound to an ephemeral loopback port, standing in for an
/// aggregator.
pub async fn loopback_listener() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind loopback socket");
    let addr = socket.local_addr().expect("Bound socket has an address");
    (socket, addr)
}

/// Receive one datagram or panic after `timeout`.
pub async fn recv_datagram(socket: &UdpSocket, timeout: Duration) -> Vec<u8> {
    let mut buf = vec![0u8; 65_535];
    let (len, _) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
        .await
        .expect("Timed out waiting for datagram")
        .expect("Failed to receive datagram");
    buf.truncate(len);
    buf
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(_) => {}
        }
    };
}
