//! Report consumers.
//!
//! A [`ReportHandler`] supplies per-user secrets to the intake pipeline and
//! receives the events of every accepted report.

use async_trait::async_trait;
use reputation_core::{EventType, SecretString};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::info;

/// One event from an accepted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedEvent {
    pub address: IpAddr,
    pub event: EventType,
    /// Occurrences this entry stands for; 1 for single events.
    pub repeat: u8,
    /// EndUser identifier in effect when the event appeared.
    pub end_user: Option<Vec<u8>>,
}

/// Decoded contents of one accepted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportBatch {
    pub username: String,
    pub peer: SocketAddr,
    /// Sender's timestamp, low 32 bits of Unix seconds.
    pub timestamp: u32,
    pub software_name: Option<String>,
    pub software_version: Option<String>,
    pub events: Vec<ReceivedEvent>,
}

impl ReportBatch {
    /// Total occurrences across all events.
    pub fn occurrences(&self) -> usize {
        self.events.iter().map(|e| usize::from(e.repeat)).sum()
    }
}

/// Trait for consumers of accepted reports.
#[async_trait]
pub trait ReportHandler: Send + Sync + 'static {
    /// Shared secret for `username`, or `None` if the user is unknown.
    async fn password(&self, username: &str) -> Option<SecretString>;

    /// Called once per accepted report.
    async fn handle_events(&self, batch: ReportBatch);
}

/// Fixed username to secret table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, SecretString>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, secret: impl Into<SecretString>) -> Self {
        self.users.insert(username.into(), secret.into());
        self
    }

    pub fn get(&self, username: &str) -> Option<SecretString> {
        self.users.get(username).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl From<&BTreeMap<String, SecretString>> for StaticCredentials {
    fn from(users: &BTreeMap<String, SecretString>) -> Self {
        Self {
            users: users.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

/// Writes every accepted event to the log.
#[derive(Debug)]
pub struct LoggingHandler {
    credentials: StaticCredentials,
}

impl LoggingHandler {
    pub fn new(credentials: StaticCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ReportHandler for LoggingHandler {
    async fn password(&self, username: &str) -> Option<SecretString> {
        self.credentials.get(username)
    }

    async fn handle_events(&self, batch: ReportBatch) {
        for event in &batch.events {
            info!(
                username = %batch.username,
                software = batch.software_name.as_deref().unwrap_or("-"),
                address = %event.address,
                event = %event.event,
                repeat = event.repeat,
                "Reputation event"
            );
        }
    }
}

/// Keeps accepted batches in memory.
#[derive(Debug)]
pub struct RecordingHandler {
    credentials: StaticCredentials,
    batches: Mutex<Vec<ReportBatch>>,
    count: watch::Sender<usize>,
}

impl RecordingHandler {
    pub fn new(credentials: StaticCredentials) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            credentials,
            batches: Mutex::new(Vec::new()),
            count,
        }
    }

    /// Batches received so far.
    pub async fn batches(&self) -> Vec<ReportBatch> {
        self.batches.lock().await.clone()
    }

    /// Wait until at least `count` batches have arrived or `timeout`
    /// elapses, then return what has been received.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ReportBatch> {
        let mut rx = self.count.subscribe();
        let _ = tokio::time::timeout(timeout, rx.wait_for(|&n| n >= count)).await;
        self.batches().await
    }
}

#[async_trait]
impl ReportHandler for RecordingHandler {
    async fn password(&self, username: &str) -> Option<SecretString> {
        self.credentials.get(username)
    }

    async fn handle_events(&self, batch: ReportBatch) {
        let mut batches = self.batches.lock().await;
        batches.push(batch);
        let len = batches.len();
        drop(batches);
        self.count.send_replace(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> ReportBatch {
        ReportBatch {
            username: "dfs".to_string(),
            peer: "192.0.2.1:40000".parse().unwrap(),
            timestamp: 1156727880,
            software_name: None,
            software_version: None,
            events: vec![
                ReceivedEvent {
                    address: "5.79.73.204".parse().unwrap(),
                    event: EventType::AutoSpam,
                    repeat: 1,
                    end_user: None,
                },
                ReceivedEvent {
                    address: "93.184.216.34".parse().unwrap(),
                    event: EventType::Greylisted,
                    repeat: 3,
                    end_user: Some(b"abc".to_vec()),
                },
            ],
        }
    }

    #[test]
    fn test_static_credentials() {
        let credentials = StaticCredentials::new().with_user("dfs", "foo");
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials.get("dfs").unwrap().expose(), "foo");
        assert!(credentials.get("nobody").is_none());
    }

    #[test]
    fn test_occurrences() {
        assert_eq!(batch().occurrences(), 4);
    }

    #[test]
    fn test_batch_serializes_event_names() {
        let json = serde_json::to_value(batch()).unwrap();
        assert_eq!(json["events"][0]["event"], "AUTO-SPAM");
        assert_eq!(json["events"][1]["repeat"], 3);
    }

    #[tokio::test]
    async fn test_recording_handler_collects() {
        let handler = RecordingHandler::new(StaticCredentials::new().with_user("dfs", "foo"));
        assert!(handler.password("dfs").await.is_some());
        handler.handle_events(batch()).await;
        let batches = handler.wait_for(1, Duration::from_millis(100)).await;
        assert_eq!(batches, vec![batch()]);
    }

    #[test]
    fn test_recording_handler_starts_empty() {
        let handler = RecordingHandler::new(StaticCredentials::new());
        assert!(tokio_test::block_on(handler.batches()).is_empty());
        assert!(tokio_test::block_on(handler.password("dfs")).is_none());
    }

    #[tokio::test]
    async fn test_recording_handler_wait_times_out() {
        let handler = RecordingHandler::new(StaticCredentials::new());
        let batches = handler.wait_for(1, Duration::from_millis(20)).await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_logging_handler_accepts_batches() {
        let handler = LoggingHandler::new(StaticCredentials::new().with_user("dfs", "foo"));
        assert!(handler.password("other").await.is_none());
        handler.handle_events(batch()).await;
    }
}
