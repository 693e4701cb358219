//! UDP report submission.

use crate::error::{ClientError, ClientResult};
use crate::queue::EventQueue;
use bytes::Bytes;
use reputation_core::{
    EventType, ProtocolError, Report, SecretString, SubReport, DEFAULT_PORT, MIN_REPORT_SIZE,
};
use reputation_log::spans::submit_span;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// A short report may go out anyway once this long has passed since the
/// last one.
pub const MAX_REPORT_INTERVAL: Duration = Duration::from_secs(3600);

/// Event bytes per datagram. Leaves room for header, metadata and
/// subreport preambles under the IPv4 UDP payload limit.
pub const MAX_EVENT_BYTES: usize = 60_000;

/// Sensor settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Aggregator host name or address.
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Upper bound for one send.
    pub timeout: Duration,
    pub software_name: Option<String>,
    pub software_version: Option<String>,
    pub end_user: Option<Vec<u8>>,
}

impl ClientConfig {
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(5),
            software_name: None,
            software_version: None,
            end_user: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_software(mut self, name: impl Into<String>, version: Option<String>) -> Self {
        self.software_name = Some(name.into());
        self.software_version = version;
        self
    }

    pub fn with_end_user(mut self, end_user: impl Into<Vec<u8>>) -> Self {
        self.end_user = Some(end_user.into());
        self
    }

    /// Subreports describing the sensor, in the order they are sent.
    fn metadata(&self) -> ClientResult<Vec<SubReport>> {
        if self.software_version.is_some() && self.software_name.is_none() {
            return Err(ProtocolError::VersionWithoutName.into());
        }
        let mut metadata = Vec::new();
        if let Some(name) = &self.software_name {
            metadata.push(SubReport::software_name(name.clone())?);
        }
        if let Some(version) = &self.software_version {
            metadata.push(SubReport::software_version(version.clone())?);
        }
        if let Some(end_user) = &self.end_user {
            metadata.push(SubReport::end_user(Bytes::from(end_user.clone()))?);
        }
        Ok(metadata)
    }
}

/// What [`ReportClient::send_report`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was queued.
    Empty,
    /// The report was too small to be worth sending yet.
    Deferred { bytes: usize },
    /// One or more datagrams went out and the queue was cleared.
    Sent {
        datagrams: usize,
        bytes: usize,
        events: usize,
    },
}

/// Collects events and submits signed reports to one aggregator.
///
/// Dropping a client with queued events makes one best-effort,
/// non-blocking attempt to send them.
pub struct ReportClient {
    socket: UdpSocket,
    server: SocketAddr,
    config: ClientConfig,
    metadata: Vec<SubReport>,
    queue: EventQueue,
    last_sent: Instant,
}

impl ReportClient {
    /// Resolve the aggregator and bind an ephemeral local socket.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let metadata = config.metadata()?;
        if config.username.len() > reputation_core::MAX_USERNAME_LEN {
            return Err(ProtocolError::UsernameTooLong(config.username.len()).into());
        }

        let target = format!("{}:{}", config.server, config.port);
        let server = lookup_host(&target)
            .await
            .map_err(|source| ClientError::Resolve {
                server: target.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ClientError::NoAddress(target.clone()))?;

        let bind = if server.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind).await?;
        debug!(server = %server, local = ?socket.local_addr().ok(), "Report client ready");

        Ok(Self {
            socket,
            server,
            config,
            metadata,
            queue: EventQueue::new(),
            last_sent: Instant::now(),
        })
    }

    /// Resolved aggregator address.
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Queue one occurrence of an event.
    pub fn record(&mut self, address: IpAddr, event: EventType) -> ClientResult<()> {
        self.queue.record(address, event)?;
        Ok(())
    }

    /// Queue several occurrences of the same event.
    pub fn record_many(&mut self, address: IpAddr, event: EventType, count: u32) -> ClientResult<()> {
        self.queue.record_many(address, event, count)?;
        Ok(())
    }

    /// Number of queued occurrences.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Build the reports that the current queue would be sent as, paired
    /// with the number of queue entries each one covers.
    pub fn build_reports(&self) -> ClientResult<Vec<(Report, usize)>> {
        let mut reports = Vec::new();
        for range in self.queue.batches(MAX_EVENT_BYTES) {
            let covered = range.len();
            let mut subreports = self.metadata.clone();
            subreports.extend(self.queue.subreports(range)?);
            reports.push((Report::new(self.config.username.clone(), subreports), covered));
        }
        Ok(reports)
    }

    /// Submit queued events.
    ///
    /// A report under [`MIN_REPORT_SIZE`] bytes is held back unless
    /// `force` is set or nothing has been sent for [`MAX_REPORT_INTERVAL`].
    /// On error the unsent events stay queued.
    pub async fn send_report(&mut self, force: bool) -> ClientResult<SendOutcome> {
        let span = submit_span(self.server, &self.config.username);
        self.send_report_inner(force).instrument(span).await
    }

    async fn send_report_inner(&mut self, force: bool) -> ClientResult<SendOutcome> {
        let reports = self.build_reports()?;
        if reports.is_empty() {
            return Ok(SendOutcome::Empty);
        }

        let datagrams = reports
            .iter()
            .map(|(report, covered)| Ok((report.encode(self.config.password.as_bytes())?, *covered)))
            .collect::<ClientResult<Vec<(Bytes, usize)>>>()?;

        let total: usize = datagrams.iter().map(|(d, _)| d.len()).sum();
        let overdue = self.last_sent.elapsed() >= MAX_REPORT_INTERVAL;
        if datagrams.len() == 1 && total < MIN_REPORT_SIZE && !force && !overdue {
            debug!(bytes = total, "Deferring short report");
            return Ok(SendOutcome::Deferred { bytes: total });
        }

        let events = self.queue.len();
        let mut sent_bytes = 0;
        for (datagram, covered) in &datagrams {
            if let Err(e) = self.send_datagram(datagram).await {
                info!(error = %e, "Unable to submit report");
                return Err(e);
            }
            sent_bytes += datagram.len();
            self.queue.drain_front(*covered);
        }

        self.last_sent = Instant::now();
        debug!(datagrams = datagrams.len(), bytes = sent_bytes, events, "Report submitted");
        Ok(SendOutcome::Sent {
            datagrams: datagrams.len(),
            bytes: sent_bytes,
            events,
        })
    }

    async fn send_datagram(&self, datagram: &[u8]) -> ClientResult<()> {
        let sent = tokio::time::timeout(self.config.timeout, self.socket.send_to(datagram, self.server))
            .await
            .map_err(|_| ClientError::Timeout(self.config.timeout))??;
        if sent != datagram.len() {
            return Err(ClientError::ShortSend {
                sent,
                expected: datagram.len(),
            });
        }
        Ok(())
    }

    /// Send whatever is queued, regardless of size.
    pub async fn flush(&mut self) -> ClientResult<SendOutcome> {
        if self.queue.is_empty() {
            return Ok(SendOutcome::Empty);
        }
        self.send_report(true).await
    }
}

impl Drop for ReportClient {
    fn drop(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let reports = match self.build_reports() {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, pending = self.queue.len(), "Discarding queued events");
                return;
            }
        };
        for (report, _) in reports {
            let result = report
                .encode(self.config.password.as_bytes())
                .map_err(ClientError::from)
                .and_then(|datagram| Ok(self.socket.try_send_to(&datagram, self.server)?));
            if let Err(e) = result {
                warn!(error = %e, server = %self.server, "Unable to submit report on drop");
            }
        }
    }
}

impl std::fmt::Debug for ReportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportClient")
            .field("server", &self.server)
            .field("username", &self.config.username)
            .field("pending", &self.queue.len())
            .finish()
    }
}
