//! UDP listener.

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::handler::ReportHandler;
use crate::intake::Intake;
use crate::stats::{ServerStats, StatsSnapshot};
use reputation_core::unix_timestamp;
use reputation_log::spans::report_span;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

/// Receives reports on one UDP socket and hands accepted batches to a
/// [`ReportHandler`].
pub struct ReportServer<H> {
    socket: Arc<UdpSocket>,
    intake: Arc<Intake<H>>,
    stats: Arc<ServerStats>,
    recv_buffer: usize,
    purge_interval: Duration,
}

impl<H: ReportHandler> ReportServer<H> {
    /// Validate the configuration and bind the socket.
    pub async fn bind(config: &ServerConfig, handler: Arc<H>) -> ServerResult<Self> {
        validate_config(config)?;
        let addr = config.server.socket_addr().ok_or_else(|| {
            ServerError::Config(vec![ConfigError::InvalidHost(config.server.host.clone())])
        })?;

        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(addr = %socket.local_addr()?, "Listening for reports");

        Ok(Self {
            socket: Arc::new(socket),
            intake: Arc::new(Intake::new(handler, config.protocol.freshness_window_secs)),
            stats: Arc::new(ServerStats::new()),
            recv_buffer: config.server.recv_buffer,
            purge_interval: config.protocol.purge_interval(),
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    pub fn intake(&self) -> &Arc<Intake<H>> {
        &self.intake
    }

    /// Serve until `shutdown` resolves, then wait for in-flight reports.
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<StatsSnapshot>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; self.recv_buffer];
        let mut tasks = JoinSet::new();
        let mut purge = tokio::time::interval(self.purge_interval);
        purge.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down report listener");
                    break;
                }
                _ = purge.tick() => {
                    let removed = self.intake.purge(unix_timestamp());
                    debug!(removed, remaining = self.intake.replay_cache().len(), "Purged replay cache");
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Report task failed");
                    }
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            self.stats.record_received();
                            let datagram = buf[..len].to_vec();
                            let intake = Arc::clone(&self.intake);
                            let stats = Arc::clone(&self.stats);
                            tasks.spawn(
                                process(intake, stats, datagram, peer).instrument(report_span(peer)),
                            );
                        }
                        Err(e) => warn!(error = %e, "Failed to receive datagram"),
                    }
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Report task failed");
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            received = snapshot.received,
            accepted = snapshot.accepted,
            rejected = snapshot.rejected,
            "Report listener stopped"
        );
        Ok(snapshot)
    }
}

async fn process<H: ReportHandler>(
    intake: Arc<Intake<H>>,
    stats: Arc<ServerStats>,
    datagram: Vec<u8>,
    peer: SocketAddr,
) {
    match intake.accept(&datagram, peer, unix_timestamp()).await {
        Ok(batch) => {
            debug!(events = batch.events.len(), "Report accepted");
            stats.record_accepted(batch.events.len());
            intake.handler().handle_events(batch).await;
        }
        Err(rejection) => {
            stats.record_rejected();
            info!(reason = rejection.kind(), "Rejected report: {}", rejection);
        }
    }
}
