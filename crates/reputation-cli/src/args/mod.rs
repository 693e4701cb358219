//! Argument parsing helpers.

pub mod parsers;

pub use parsers::{parse_event_spec, parse_hex, parse_timeout_ms, EventSpec};
