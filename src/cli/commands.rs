//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// broker-access - Declarative service plan access for Cloud Foundry brokers.
#[derive(Parser, Debug)]
#[command(name = "broker-access")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "BROKER_ACCESS_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Write a template configuration and `.env.example`.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the access configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Compute and display the access plan.
    Plan {
        /// Also print the observed access in compact form.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Apply the access plan.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Register the broker, or update a stale registration.
    Register {
        /// Update the registration even if it looks current, to push a new password.
        #[arg(short, long)]
        force: bool,
    },

    /// Delete the broker registration.
    Unregister {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Check for drift between configuration and granted access.
    Drift,

    /// Print the currently granted access in compact form.
    Observed,
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
