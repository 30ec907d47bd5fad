//! Error types for plugin-base.
//!
//! Argument validation failures of action plugins are reported as data in the
//! [`ExecutionResult`](crate::result::ExecutionResult) and never show up here.
//! Every other failure unwinds to the host engine through this enum.

use std::path::PathBuf;
use thiserror::Error;

use crate::connection::ConnectionError;

/// Result type alias for plugin-base operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for plugin-base.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Plugin Errors
    // ========================================================================
    /// Fatal failure raised from inside an action plugin.
    ///
    /// Covers remote command failures, unsupported remote encodings and
    /// local temp file I/O.
    #[error("{0}")]
    ActionFail(String),

    /// Lookup plugin failure, including variable validation errors.
    #[error("{0}")]
    Lookup(String),

    /// A plugin name is not registered.
    #[error("Unable to load {kind} named \"{name}\"")]
    PluginNotFound {
        /// Plugin kind (`action` or `lookup`)
        kind: PluginKind,
        /// Requested name
        name: String,
    },

    /// A module name is not registered.
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    // ========================================================================
    // Path Errors
    // ========================================================================
    /// No file matched across the search path stack.
    #[error("Could not find or access '{needle}'\nSearched in:\n\t{}", join_paths(.searched))]
    NeedleNotFound {
        /// File name that was searched for
        needle: String,
        /// Directories (with sub directory) that were tried
        searched: Vec<PathBuf>,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration or configuration lookup is unavailable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine version string could not be parsed.
    #[error("Invalid engine version: '{0}'")]
    InvalidVersion(String),

    // ========================================================================
    // Transport and IO Errors
    // ========================================================================
    /// Connection level failure (spawn, transfer, timeout).
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n\t")
}

/// Kind of a dispatchable plugin, used in not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Action,
    Lookup,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::Action => write!(f, "action"),
            PluginKind::Lookup => write!(f, "lookup"),
        }
    }
}

impl Error {
    /// Creates a new action failure.
    pub fn action_fail(message: impl Into<String>) -> Self {
        Self::ActionFail(message.into())
    }

    /// Creates a new lookup failure.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup(message.into())
    }

    /// Creates a new not-found error for an action plugin.
    pub fn action_not_found(name: impl Into<String>) -> Self {
        Self::PluginNotFound {
            kind: PluginKind::Action,
            name: name.into(),
        }
    }

    /// Creates a new not-found error for a lookup plugin.
    pub fn lookup_not_found(name: impl Into<String>) -> Self {
        Self::PluginNotFound {
            kind: PluginKind::Lookup,
            name: name.into(),
        }
    }

    /// Returns true if this error comes from plugin execution rather than
    /// from environment or configuration problems.
    pub fn is_plugin_failure(&self) -> bool {
        matches!(self, Error::ActionFail(_) | Error::Lookup(_))
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ActionFail(_) | Error::Lookup(_) => 2,
            Error::Connection(_) => 3,
            Error::Config(_) | Error::TomlParse(_) => 4,
            Error::PluginNotFound { .. } | Error::ModuleNotFound(_) => 5,
            Error::NeedleNotFound { .. } => 6,
            _ => 1,
        }
    }
}
