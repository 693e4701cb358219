//! Reputation CLI library
//!
//! Argument definitions and command implementations behind the
//! `reputation` binary.

pub mod args;
pub mod cli;
pub mod commands;
pub mod error;

pub use error::CliError;
