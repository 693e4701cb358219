//! End-to-end tests over loopback UDP.

use reputation_client::{ClientConfig, ReportClient};
use reputation_core::{EventType, IpEvent, Report, SubReport};
use reputation_server::{
    Intake, RecordingHandler, ReportServer, ServerConfig, ServerStats, StaticCredentials,
    StatsSnapshot,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    addr: SocketAddr,
    handler: Arc<RecordingHandler>,
    intake: Arc<Intake<RecordingHandler>>,
    stats: Arc<ServerStats>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<StatsSnapshot>,
}

async fn start() -> Running {
    start_with(|_| {}).await
}

async fn start_with(configure: impl FnOnce(&mut ServerConfig)) -> Running {
    let mut config = ServerConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.users.insert("dfs".to_string(), "foo".into());
    configure(&mut config);

    let handler = Arc::new(RecordingHandler::new(StaticCredentials::from(&config.users)));
    let server = ReportServer::bind(&config, Arc::clone(&handler)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let stats = server.stats();
    let intake = Arc::clone(server.intake());
    let (stop, stopped) = oneshot::channel();
    let task = tokio::spawn(async move {
        server
            .run_until(async {
                let _ = stopped.await;
            })
            .await
            .unwrap()
    });
    Running {
        addr,
        handler,
        intake,
        stats,
        stop,
        task,
    }
}

impl Running {
    /// Wait until `count` reports have been accepted or rejected.
    async fn settled(&self, count: u64) -> StatsSnapshot {
        for _ in 0..250 {
            let snapshot = self.stats.snapshot();
            if snapshot.accepted + snapshot.rejected >= count {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.stats.snapshot()
    }

    async fn shutdown(self) -> StatsSnapshot {
        let _ = self.stop.send(());
        self.task.await.unwrap()
    }
}

async fn send_raw(addr: SocketAddr, datagram: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(datagram, addr).await.unwrap();
}

#[tokio::test]
async fn test_client_reports_reach_handler() {
    let running = start().await;

    let config = ClientConfig::new("127.0.0.1", "dfs", "foo")
        .with_port(running.addr.port())
        .with_software("postfix-rep", Some("1.0".to_string()))
        .with_end_user(b"tenant-7".to_vec());
    let mut client = ReportClient::connect(config).await.unwrap();
    client.record_many("5.79.73.204".parse().unwrap(), EventType::AutoSpam, 3).unwrap();
    client.record("2606:2800:220:1:248:1893:25c8:1946".parse().unwrap(), EventType::Phish).unwrap();
    client.flush().await.unwrap();

    let batches = running.handler.wait_for(1, Duration::from_secs(5)).await;
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.username, "dfs");
    assert_eq!(batch.software_name.as_deref(), Some("postfix-rep"));
    assert_eq!(batch.software_version.as_deref(), Some("1.0"));
    assert_eq!(batch.occurrences(), 4);
    assert!(batch
        .events
        .iter()
        .all(|e| e.end_user.as_deref() == Some(&b"tenant-7"[..])));

    let stats = running.shutdown().await;
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 0);
}

#[tokio::test]
async fn test_replayed_and_forged_reports_are_dropped() {
    let running = start().await;

    let report = Report::new(
        "dfs",
        vec![SubReport::Ipv4Events(vec![IpEvent::new(
            "93.184.216.34".parse().unwrap(),
            EventType::HandSpam,
        )
        .unwrap()])],
    );
    let datagram = report.encode(b"foo").unwrap();
    send_raw(running.addr, &datagram).await;
    assert_eq!(running.handler.wait_for(1, Duration::from_secs(5)).await.len(), 1);

    send_raw(running.addr, &datagram).await;
    let forged = report.encode(b"wrong").unwrap();
    send_raw(running.addr, &forged).await;
    send_raw(running.addr, b"garbage").await;

    let snapshot = running.settled(4).await;
    assert_eq!(snapshot.received, 4);
    assert_eq!(snapshot.accepted, 1);
    assert_eq!(snapshot.rejected, 3);
    assert_eq!(running.handler.batches().await.len(), 1);
    running.shutdown().await;
}

#[tokio::test]
async fn test_replay_cache_is_purged_periodically() {
    let running = start_with(|config| {
        config.protocol.freshness_window_secs = 1;
        config.protocol.purge_interval_secs = 1;
    })
    .await;

    let report = Report::new(
        "dfs",
        vec![SubReport::Ipv4Events(vec![IpEvent::new(
            "93.184.216.34".parse().unwrap(),
            EventType::AuthFailed,
        )
        .unwrap()])],
    );
    send_raw(running.addr, &report.encode(b"foo").unwrap()).await;
    assert_eq!(running.handler.wait_for(1, Duration::from_secs(5)).await.len(), 1);
    assert_eq!(running.intake.replay_cache().len(), 1);

    let mut purged = false;
    for _ in 0..100 {
        if running.intake.replay_cache().is_empty() {
            purged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(purged, "replay cache still holds the report");
    running.shutdown().await;
}

#[tokio::test]
async fn test_bind_rejects_invalid_config() {
    let mut config = ServerConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.protocol.freshness_window_secs = 0;
    let handler = Arc::new(RecordingHandler::new(StaticCredentials::new()));
    assert!(ReportServer::bind(&config, handler).await.is_err());
}
