//! CLI module for the Stratum deployment tool.
//!
//! This module provides the command-line interface for managing
//! environments and deploying desired-state documents.

mod commands;
mod output;

pub use commands::{Cli, Commands, ConfigCommands, EnvCommands, OutputFormat};
pub use output::{format_duration, ConsoleObserver, EnvSummary, OutputFormatter, CORRUPT_WARNING};
