//! Reputation aggregator binary.

use anyhow::{Context, Result};
use clap::Parser;
use reputation_log::LogConfig;
use reputation_server::{
    load_config, shutdown_signal, validate_config, LoggingHandler, ReportServer, StaticCredentials,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "reputation-server", version, about = "Receive IP reputation reports")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "REPUTATION_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            eprintln!("config: {}", e);
        }
        anyhow::bail!("{} configuration error(s)", errors.len());
    }
    if args.check {
        println!("Configuration OK ({} users)", config.users.len());
        return Ok(());
    }

    let log_config =
        LogConfig::from_env().with_settings(&config.logging.level, &config.logging.format);
    reputation_log::init(log_config).context("Failed to initialize logging")?;

    info!("Starting reputation server v{}", env!("CARGO_PKG_VERSION"));
    let credentials = StaticCredentials::from(&config.users);
    if credentials.is_empty() {
        warn!("No users configured; every report will be rejected");
    }

    let handler = Arc::new(LoggingHandler::new(credentials));
    let server = ReportServer::bind(&config, handler).await?;
    match server.run_until(shutdown_signal()).await {
        Ok(stats) => {
            info!(accepted = stats.accepted, "Server shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            Err(e.into())
        }
    }
}
