//! CLI module for the broker access tool.
//!
//! This module provides the command-line interface for planning and
//! applying broker plan access.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
