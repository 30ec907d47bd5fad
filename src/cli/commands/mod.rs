//! Subcommands module for the plugin-base CLI

pub mod check;
pub mod collection;

use crate::cli::output::OutputFormatter;
use plugin_base::config::Config;
use plugin_base::plugins::PluginRegistry;
use std::sync::Arc;

/// Common context shared between commands
pub struct CommandContext {
    pub config: Arc<Config>,
    pub output: OutputFormatter,
    pub verbosity: u8,
    /// Registry with the built-in lookups and modules
    pub registry: Arc<PluginRegistry>,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.colors.enabled;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());
        let config = Arc::new(config);
        let registry = Arc::new(PluginRegistry::with_builtins(config.clone()));

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
            registry,
        }
    }
}
