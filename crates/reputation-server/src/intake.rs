//! Verification pipeline for received datagrams.

use crate::handler::{ReceivedEvent, ReportBatch, ReportHandler};
use crate::replay::{clock_distance, ReplayCache};
use reputation_core::{ProtocolError, SignedReport, SubReport};
use reputation_log::spans::record_username;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, Span};

/// Why a datagram was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("malformed report: {0}")]
    Malformed(ProtocolError),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown user {0:?}")]
    UnknownUser(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("report carries no subreports")]
    Empty,

    #[error("timestamp {timestamp} is {distance}s from server clock")]
    Stale { timestamp: u32, distance: u32 },

    #[error("report already received")]
    Replayed,

    #[error("invalid report content: {0}")]
    Invalid(ProtocolError),
}

impl Rejection {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Malformed(_) => "malformed",
            Rejection::UnsupportedVersion(_) => "unsupported_version",
            Rejection::UnknownUser(_) => "unknown_user",
            Rejection::BadSignature => "bad_signature",
            Rejection::Empty => "empty",
            Rejection::Stale { .. } => "stale",
            Rejection::Replayed => "replayed",
            Rejection::Invalid(_) => "invalid",
        }
    }
}

/// Turns datagrams into [`ReportBatch`]es.
pub struct Intake<H> {
    handler: Arc<H>,
    replay: ReplayCache,
    window: u32,
}

impl<H: ReportHandler> Intake<H> {
    pub fn new(handler: Arc<H>, window: u32) -> Self {
        Self {
            handler,
            replay: ReplayCache::new(window),
            window,
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    pub fn replay_cache(&self) -> &ReplayCache {
        &self.replay
    }

    /// Run one datagram through every check. `now` is the server clock in
    /// Unix seconds, truncated to 32 bits.
    pub async fn accept(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        now: u32,
    ) -> Result<ReportBatch, Rejection> {
        let report = SignedReport::parse(datagram).map_err(|e| match e {
            ProtocolError::UnsupportedVersion(v) => Rejection::UnsupportedVersion(v),
            other => Rejection::Malformed(other),
        })?;
        record_username(&Span::current(), report.username());

        let secret = self
            .handler
            .password(report.username())
            .await
            .ok_or_else(|| Rejection::UnknownUser(report.username().to_string()))?;

        report
            .verify(secret.as_bytes())
            .map_err(|_| Rejection::BadSignature)?;

        if report.is_empty() {
            return Err(Rejection::Empty);
        }

        let distance = clock_distance(now, report.timestamp());
        if distance > self.window {
            return Err(Rejection::Stale {
                timestamp: report.timestamp(),
                distance,
            });
        }

        if !self.replay.check_and_insert(report.timestamp(), report.nonce()) {
            return Err(Rejection::Replayed);
        }

        let subreports = report.subreports().map_err(Rejection::Invalid)?;
        collect_batch(&report, peer, subreports).map_err(Rejection::Invalid)
    }

    /// Drop replay entries that can no longer match a fresh report.
    pub fn purge(&self, now: u32) -> usize {
        self.replay.purge(now)
    }
}

fn collect_batch(
    report: &SignedReport<'_>,
    peer: SocketAddr,
    subreports: Vec<SubReport>,
) -> Result<ReportBatch, ProtocolError> {
    let mut batch = ReportBatch {
        username: report.username().to_string(),
        peer,
        timestamp: report.timestamp(),
        software_name: None,
        software_version: None,
        events: Vec::new(),
    };
    let mut end_user: Option<Vec<u8>> = None;

    for subreport in subreports {
        match subreport {
            SubReport::SoftwareName(name) => {
                if batch.software_name.replace(name).is_some() {
                    return Err(ProtocolError::DuplicateSubreport("software name"));
                }
            }
            SubReport::SoftwareVersion(version) => {
                if batch.software_version.replace(version).is_some() {
                    return Err(ProtocolError::DuplicateSubreport("software version"));
                }
            }
            SubReport::EndUser(id) => end_user = Some(id.to_vec()),
            SubReport::Ipv4Events(events) | SubReport::Ipv6Events(events) => {
                batch.events.extend(events.into_iter().map(|e| ReceivedEvent {
                    address: e.address(),
                    event: e.event(),
                    repeat: 1,
                    end_user: end_user.clone(),
                }));
            }
            SubReport::RepeatedIpv4Events(events) | SubReport::RepeatedIpv6Events(events) => {
                batch.events.extend(events.into_iter().map(|e| ReceivedEvent {
                    address: e.address(),
                    event: e.event(),
                    repeat: e.repeat(),
                    end_user: end_user.clone(),
                }));
            }
            SubReport::Unknown { format, content } => {
                debug!(format, length = content.len(), "Skipping unknown subreport");
            }
        }
    }

    if batch.software_version.is_some() && batch.software_name.is_none() {
        return Err(ProtocolError::VersionWithoutName);
    }
    Ok(batch)
}
