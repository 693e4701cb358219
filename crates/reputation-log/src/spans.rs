//! Spans that tag log lines with the reporting peer.

use std::fmt::Display;
use tracing::{info_span, Span};

/// Span for processing one received report. The username is recorded
/// once the header has been parsed.
pub fn report_span(peer: impl Display) -> Span {
    info_span!("report", peer = %peer, username = tracing::field::Empty)
}

/// Record the username on a [`report_span`].
pub fn record_username(span: &Span, username: &str) {
    span.record("username", username);
}

/// Span for a sensor submitting to an aggregator.
pub fn submit_span(server: impl Display, username: &str) -> Span {
    info_span!("submit", server = %server, username = %username)
}
