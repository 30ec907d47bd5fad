//! Config lookup - expose configuration settings to plugins

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::{LookupContext, LookupPlugin};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::task::PluginArgs;

/// Setting holding the collection roots
pub const COLLECTIONS_PATHS: &str = "COLLECTIONS_PATHS";
/// Setting holding the local temporary directories
pub const SYSTEM_TMPDIRS: &str = "SYSTEM_TMPDIRS";
/// Setting holding the remote temporary directory base
pub const REMOTE_TMP: &str = "REMOTE_TMP";

/// Resolves setting names against the loaded [`Config`].
///
/// The `on_missing` keyword controls unknown settings: `error` (default)
/// fails, `warn` logs and skips, `skip` skips silently.
#[derive(Debug, Clone)]
pub struct ConfigLookup {
    config: Arc<Config>,
}

impl ConfigLookup {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn setting(&self, name: &str) -> Option<Value> {
        let paths = |paths: Vec<std::path::PathBuf>| {
            Value::Array(
                paths
                    .into_iter()
                    .map(|p| Value::String(p.display().to_string()))
                    .collect(),
            )
        };

        match name {
            COLLECTIONS_PATHS => Some(paths(self.config.collections_paths())),
            SYSTEM_TMPDIRS => Some(paths(self.config.system_tmpdirs())),
            REMOTE_TMP => Some(json!(self.config.remote_tmp)),
            _ => None,
        }
    }
}

impl LookupPlugin for ConfigLookup {
    fn run(
        &self,
        _ctx: &LookupContext,
        terms: &[Value],
        _variables: &PluginArgs,
        kwargs: &PluginArgs,
    ) -> Result<Vec<Value>> {
        let on_missing = kwargs
            .get("on_missing")
            .and_then(Value::as_str)
            .unwrap_or("error");
        if !matches!(on_missing, "error" | "warn" | "skip") {
            return Err(Error::lookup(format!(
                "\"on_missing\" must be a string and one of \"error\", \"warn\" or \"skip\", not {}",
                on_missing
            )));
        }

        let mut values = Vec::with_capacity(terms.len());
        for term in terms {
            let name = term.as_str().ok_or_else(|| {
                Error::lookup(format!("Invalid setting identifier, \"{}\" is not a string", term))
            })?;

            match self.setting(name) {
                Some(value) => values.push(value),
                None => match on_missing {
                    "error" => {
                        return Err(Error::lookup(format!("Unable to find setting {}", name)))
                    }
                    "warn" => warn!(setting = %name, "Skipping, did not find setting"),
                    _ => {}
                },
            }
        }

        Ok(values)
    }
}
