//! Send command implementation.

use std::time::Duration;

use clap::Parser;
use reputation_client::{ClientConfig, ReportClient, SendOutcome};
use reputation_core::DEFAULT_PORT;
use tracing::info;

use crate::args::{parse_timeout_ms, EventSpec};
use crate::cli::CommandContext;
use crate::error::CliError;

/// Submit events to an aggregator
#[derive(Debug, Parser)]
pub struct SendCommand {
    /// Aggregator host name or address
    #[arg(short, long, env = "REPUTATION_SERVER")]
    server: String,

    /// Aggregator UDP port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Reporting username
    #[arg(short, long, env = "REPUTATION_USERNAME")]
    username: String,

    /// Shared secret
    #[arg(long, env = "REPUTATION_PASSWORD", hide_env_values = true)]
    password: String,

    /// Sensor software name
    #[arg(long)]
    software_name: Option<String>,

    /// Sensor software version (requires --software-name)
    #[arg(long, requires = "software_name")]
    software_version: Option<String>,

    /// EndUser identifier attached to the events
    #[arg(long)]
    end_user: Option<String>,

    /// Send timeout in milliseconds
    #[arg(long, default_value = "5000", value_parser = parse_timeout_ms)]
    timeout_ms: Duration,

    /// Events as EVENT,ADDRESS[,COUNT]
    #[arg(required = true, value_name = "EVENT,ADDRESS[,COUNT]")]
    events: Vec<EventSpec>,
}

impl SendCommand {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.server, &self.username, self.password.as_str())
            .with_port(self.port)
            .with_timeout(self.timeout_ms);
        if let Some(name) = &self.software_name {
            config = config.with_software(name, self.software_version.clone());
        }
        if let Some(end_user) = &self.end_user {
            config = config.with_end_user(end_user.as_bytes());
        }
        config
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let mut client = ReportClient::connect(self.client_config()).await?;
        for spec in &self.events {
            client.record_many(spec.address, spec.event, spec.count)?;
        }

        match client.send_report(true).await? {
            SendOutcome::Sent {
                datagrams,
                bytes,
                events,
            } => {
                info!(server = %client.server(), datagrams, bytes, "Report sent");
                if !ctx.quiet {
                    println!(
                        "Sent {} event(s) in {} datagram(s), {} bytes, to {}",
                        events,
                        datagrams,
                        bytes,
                        client.server()
                    );
                }
            }
            SendOutcome::Empty | SendOutcome::Deferred { .. } => {
                return Err(CliError::usage("No events to send"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Wrapper {
        #[command(flatten)]
        send: SendCommand,
    }

    fn parse(args: &[&str]) -> Result<SendCommand, clap::Error> {
        let mut argv = vec!["send"];
        argv.extend_from_slice(args);
        Wrapper::try_parse_from(argv).map(|w| w.send)
    }

    #[test]
    fn test_parses_full_command() {
        let cmd = parse(&[
            "--server",
            "reputation.example",
            "--username",
            "dfs",
            "--password",
            "foo",
            "--software-name",
            "postfix-rep",
            "--software-version",
            "1.0",
            "--end-user",
            "tenant",
            "AUTO-SPAM,5.79.73.204",
            "GREYLISTED,93.184.216.34,3",
        ])
        .unwrap();
        assert_eq!(cmd.port, 6568);
        assert_eq!(cmd.events.len(), 2);
        assert_eq!(cmd.events[1].count, 3);

        let config = cmd.client_config();
        assert_eq!(config.username, "dfs");
        assert_eq!(config.software_version.as_deref(), Some("1.0"));
        assert_eq!(config.end_user.as_deref(), Some(&b"tenant"[..]));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_version_requires_name() {
        let result = parse(&[
            "--server",
            "h",
            "--username",
            "u",
            "--password",
            "p",
            "--software-version",
            "1.0",
            "AUTO-SPAM,5.79.73.204",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_event_spec() {
        let result = parse(&[
            "--server",
            "h",
            "--username",
            "u",
            "--password",
            "p",
            "AUTO-SPAM,192.168.1.1",
        ]);
        assert!(result.is_err());
    }
}
