//! The task an action plugin executes on behalf of.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Plugin arguments: ordered name to value mapping.
pub type PluginArgs = IndexMap<String, Value>;

/// Variables visible to a task.
pub type TaskVars = IndexMap<String, Value>;

/// A task as seen by an action plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Action identifier (possibly fully qualified: `ns.collection.action`)
    pub action: String,

    /// Display name given in the play
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Working arguments; replaced by the normalized arguments after validation
    #[serde(default)]
    pub args: PluginArgs,

    /// Task-local search path used by needle lookups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_path: Vec<PathBuf>,
}

impl Task {
    /// Create a task for the given action
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the arguments
    pub fn with_args(mut self, args: PluginArgs) -> Self {
        self.args = args;
        self
    }

    /// Add one argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Set the task search path
    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    /// Display name, falling back to the action identifier
    pub fn get_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.action)
    }
}
