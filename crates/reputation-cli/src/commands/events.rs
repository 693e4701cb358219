//! Events command implementation.

use clap::Parser;
use reputation_core::EventType;
use serde::Serialize;

use crate::cli::CommandContext;
use crate::error::CliError;

/// List the event types a report can carry
#[derive(Debug, Parser)]
pub struct EventsCommand {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct EventRow {
    code: u8,
    name: &'static str,
}

impl EventsCommand {
    pub async fn execute(&self, _ctx: &CommandContext) -> Result<(), CliError> {
        println!("{}", self.render()?);
        Ok(())
    }

    fn render(&self) -> Result<String, CliError> {
        let rows: Vec<EventRow> = EventType::ALL
            .iter()
            .map(|e| EventRow {
                code: e.code(),
                name: e.name(),
            })
            .collect();

        if self.json {
            return serde_json::to_string_pretty(&rows).map_err(|e| CliError::Other(e.into()));
        }
        Ok(rows
            .iter()
            .map(|row| format!("{:>3}  {}", row.code, row.name))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
