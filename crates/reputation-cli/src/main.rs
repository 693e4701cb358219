//! Reputation CLI
//!
//! Main entry point for the `reputation` binary.

use std::process::ExitCode;

use clap::Parser;
use reputation_cli::cli::Cli;
use reputation_log::{LogConfig, LogFormat, LogLevel};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if std::env::var_os("REPUTATION_LOG_LEVEL").is_none() && std::env::var_os("RUST_LOG").is_none() {
        log_config.level = LogLevel::parse(cli.log_level()).unwrap_or(log_config.level);
    }
    if std::env::var_os("REPUTATION_LOG_FORMAT").is_none() {
        log_config.format = LogFormat::Compact;
    }
    if let Err(e) = reputation_log::init(log_config) {
        eprintln!("warning: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cli.execute()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error [{}]: {e}", e.code());
            if let Some(hint) = e.hint() {
                eprintln!("  hint: {hint}");
            }
            e.exit_code()
        }
    }
}
