//! CLI module for plugin-base
//!
//! Developer tooling around the plugin base layer: check arguments against
//! a plugin schema and resolve collection files the way plugins do.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// plugin-base - developer tools for action and lookup plugins
#[derive(Parser, Debug, Clone)]
#[command(name = "plugin-base")]
#[command(author = "plugin-base Contributors")]
#[command(version)]
#[command(about = "Check plugin arguments and resolve collection paths", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "PLUGIN_BASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate arguments against a plugin schema
    Check(commands::check::CheckArgs),

    /// Print the candidate directories of a collection
    #[command(name = "collection-path")]
    CollectionPath(commands::collection::CollectionPathArgs),

    /// Find a file in a collection and a search path
    Find(commands::collection::FindArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
