//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stratum - plan, deploy and checkpoint resource environments.
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Environment to operate on (defaults to the current one).
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage environments.
    Env {
        /// Environment subcommand.
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Read or change the current environment's configuration variables.
    Config {
        /// Configuration subcommand.
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show the steps a deployment would take, without applying them.
    Plan {
        /// Desired-state document (searched for upwards if omitted).
        doc: Option<PathBuf>,

        /// Write the would-be snapshot to this envfile instead of printing.
        #[arg(short = 'f', long = "file")]
        output_file: Option<PathBuf>,

        /// Also show unchanged resources and properties.
        #[arg(long)]
        show_sames: bool,

        /// Count both halves of each replacement in the summary.
        #[arg(long)]
        show_replace_steps: bool,
    },

    /// Plan and apply a desired-state document.
    Deploy {
        /// Desired-state document (searched for upwards if omitted).
        doc: Option<PathBuf>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Keep applying remaining steps after a failure.
        #[arg(long)]
        continue_on_error: bool,

        /// Also show unchanged resources and properties.
        #[arg(long)]
        show_sames: bool,

        /// Count both halves of each replacement in the summary.
        #[arg(long)]
        show_replace_steps: bool,
    },

    /// Delete every resource in the environment.
    Destroy {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Keep deleting remaining resources after a failure.
        #[arg(long)]
        continue_on_error: bool,
    },
}

/// Environment management subcommands.
#[derive(Subcommand, Debug)]
pub enum EnvCommands {
    /// Create an empty environment and select it.
    Init {
        /// Environment name.
        name: String,
    },

    /// List environments.
    Ls,

    /// Remove an environment, keeping a backup of its envfile.
    Rm {
        /// Environment name.
        name: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Select the current environment (clears it when no name is given).
    Select {
        /// Environment name.
        name: Option<String>,
    },
}

/// Configuration variable subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print one variable, or all of them.
    Get {
        /// Variable name.
        key: Option<String>,
    },

    /// Set a variable.
    Set {
        /// Variable name.
        key: String,

        /// New value.
        value: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
