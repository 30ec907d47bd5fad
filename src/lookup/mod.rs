//! Lookup plugin contract.
//!
//! A lookup plugin implements [`LookupPlugin::run`] and is registered with
//! an immutable [`LookupSpec`]. [`LookupBase`] owns the control flow: it
//! validates the variables against the declared spec and only then calls
//! the plugin.
//!
//! # Example
//!
//! ```rust,ignore
//! use plugin_base::lookup::{LookupContext, LookupPlugin, LookupSpec};
//!
//! struct Upper;
//!
//! impl LookupPlugin for Upper {
//!     fn run(&self, _ctx: &LookupContext, terms: &[Value], _vars: &PluginArgs, _kwargs: &PluginArgs)
//!         -> Result<Vec<Value>>
//!     {
//!         Ok(terms.iter().map(|t| json!(t.as_str().unwrap_or_default().to_uppercase())).collect())
//!     }
//! }
//!
//! registry.register_lookup("upper", LookupSpec::new(), || Upper);
//! ```

pub mod config;

pub use config::ConfigLookup;

use serde_json::Value;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::path;
use crate::plugins::PluginRegistry;
use crate::task::PluginArgs;
use crate::validation::{check_argspec, ArgumentSpec, Schema};

/// Variable holding the template search path
pub const SEARCH_PATH_VAR: &str = "search_path";

/// Marks a value produced by a lookup: it must not be templated again.
#[derive(Debug, Clone, PartialEq)]
pub struct Unsafe<T>(pub T);

impl<T> Unsafe<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Unsafe<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Declared inputs of a lookup plugin
#[derive(Debug, Clone, Default)]
pub struct LookupSpec {
    /// Specification the lookup variables are validated against
    pub variables_spec: Option<ArgumentSpec>,
}

impl LookupSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables_spec(mut self, spec: ArgumentSpec) -> Self {
        self.variables_spec = Some(spec);
        self
    }
}

/// Trait that all lookup plugins must implement
pub trait LookupPlugin: Send + Sync {
    /// Plugin business logic, called with validated variables
    fn run(
        &self,
        ctx: &LookupContext,
        terms: &[Value],
        variables: &PluginArgs,
        kwargs: &PluginArgs,
    ) -> Result<Vec<Value>>;
}

/// Context handed to a lookup plugin
#[derive(Clone)]
pub struct LookupContext {
    name: String,
    registry: Arc<PluginRegistry>,
}

impl LookupContext {
    pub fn new(name: impl Into<String>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    /// Name the lookup was registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Run another registered lookup
    pub fn execute_lookup(
        &self,
        name: &str,
        terms: &[Value],
        variables: Option<PluginArgs>,
        kwargs: &PluginArgs,
    ) -> Result<Unsafe<Vec<Value>>> {
        self.registry
            .run_lookup(name, terms, variables, kwargs)
            .map(Unsafe)
    }

    /// Candidate directories of a collection
    pub fn get_collection_path(&self, full_name: &str) -> Result<Vec<PathBuf>> {
        path::get_collection_path(&self.registry, full_name)
    }

    /// Append the collection directories of `full_name` to the `search_path`
    /// variable, creating it when missing.
    pub fn append_collection_path_to_search_path(
        &self,
        full_name: &str,
        variables: Option<PluginArgs>,
    ) -> Result<PluginArgs> {
        let mut variables = variables.unwrap_or_default();

        let mut search_path = match variables.shift_remove(SEARCH_PATH_VAR) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };

        for candidate in self.get_collection_path(full_name)? {
            let candidate = Value::String(candidate.display().to_string());
            if !search_path.contains(&candidate) {
                search_path.push(candidate);
            }
        }

        variables.insert(SEARCH_PATH_VAR.to_string(), Value::Array(search_path));
        Ok(variables)
    }
}

impl std::fmt::Debug for LookupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupContext")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Validate lookup variables against a spec.
///
/// Returns the normalized variables or a lookup error listing every failure.
pub fn check_variables(
    lookup_name: &str,
    variables: &PluginArgs,
    spec: &ArgumentSpec,
) -> Result<PluginArgs> {
    let caller = format!("Lookup {}", lookup_name);
    let schema = Schema::ArgSpec(spec.clone());
    let outcome = check_argspec(&caller, variables, &schema, None, None);

    if outcome.valid {
        Ok(outcome.normalized)
    } else {
        debug!(lookup = %lookup_name, errors = outcome.errors.len(), "Variable validation failed");
        Err(Error::lookup(format!(
            "Errors during variables validation => \n- {}",
            outcome.errors.join("\n- ")
        )))
    }
}

/// Runner that validates variables before invoking a lookup plugin
pub struct LookupBase {
    plugin: Box<dyn LookupPlugin>,
    spec: Arc<LookupSpec>,
    ctx: LookupContext,
}

impl LookupBase {
    pub fn new(plugin: Box<dyn LookupPlugin>, spec: Arc<LookupSpec>, ctx: LookupContext) -> Self {
        Self { plugin, spec, ctx }
    }

    pub fn context(&self) -> &LookupContext {
        &self.ctx
    }

    /// Validate the variables, then run the plugin
    pub fn run(
        &self,
        terms: &[Value],
        variables: Option<PluginArgs>,
        kwargs: &PluginArgs,
    ) -> Result<Vec<Value>> {
        let variables = variables.unwrap_or_default();

        let variables = match &self.spec.variables_spec {
            Some(spec) => check_variables(self.ctx.name(), &variables, spec)?,
            None => variables,
        };

        debug!(lookup = %self.ctx.name(), terms = terms.len(), "Running lookup");
        self.plugin.run(&self.ctx, terms, &variables, kwargs)
    }
}
