//! CLI argument definitions using clap derive macros.

use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{DecodeCommand, EventsCommand, SendCommand};
use crate::error::CliError;

/// Send and inspect IP reputation reports
#[derive(Debug, Parser)]
#[command(
    name = "reputation",
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit events to an aggregator
    Send(SendCommand),

    /// List event types
    Events(EventsCommand),

    /// Decode a captured report
    Decode(DecodeCommand),
}

impl Cli {
    /// Log level implied by -v / -q.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Execute the selected command
    pub async fn execute(self) -> Result<(), CliError> {
        let ctx = CommandContext {
            verbose: self.verbose,
            quiet: self.quiet,
        };

        match self.command {
            Command::Send(cmd) => cmd.execute(&ctx).await,
            Command::Events(cmd) => cmd.execute(&ctx).await,
            Command::Decode(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Context passed to all commands
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandContext {
    pub verbose: u8,
    pub quiet: bool,
}
