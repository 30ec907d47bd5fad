//! Plugin registry and dispatch.
//!
//! Action and lookup plugins are registered by name together with their
//! immutable spec and a factory producing a fresh plugin instance per call.
//! Modules are kept in a [`ModuleRegistry`]. Unknown names fail with
//! [`Error::PluginNotFound`].
//!
//! # Example
//!
//! ```rust,ignore
//! use plugin_base::plugins::PluginRegistry;
//!
//! let mut registry = PluginRegistry::with_builtins(config.clone());
//! registry.register_action("my.ns.greet", ActionSpec::new(), || Greet);
//! let registry = Arc::new(registry);
//!
//! let result = registry
//!     .run_action("my.ns.greet", task, connection, config, None)
//!     .await?;
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::action::{ActionBase, ActionContext, ActionPlugin, ActionSpec};
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::lookup::{ConfigLookup, LookupBase, LookupContext, LookupPlugin, LookupSpec};
use crate::modules::{Module, ModuleRegistry};
use crate::result::ExecutionResult;
use crate::task::{PluginArgs, Task, TaskVars};

type ActionFactory = Arc<dyn Fn() -> Box<dyn ActionPlugin> + Send + Sync>;
type LookupFactory = Arc<dyn Fn() -> Box<dyn LookupPlugin> + Send + Sync>;

#[derive(Clone)]
struct Entry<F, S> {
    factory: F,
    spec: Arc<S>,
}

/// Look a name up as is, then by its last dotted segment
fn resolve<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        name.rsplit_once('.')
            .and_then(|(_, short)| map.get(short))
    })
}

/// Registry of action plugins, lookup plugins and modules
#[derive(Default)]
pub struct PluginRegistry {
    actions: HashMap<String, Entry<ActionFactory, ActionSpec>>,
    lookups: HashMap<String, Entry<LookupFactory, LookupSpec>>,
    modules: ModuleRegistry,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `config` lookup and modules
    pub fn with_builtins(config: Arc<Config>) -> Self {
        let mut registry = Self {
            modules: ModuleRegistry::with_builtins(),
            ..Self::default()
        };
        registry.register_lookup("config", LookupSpec::new(), move || {
            ConfigLookup::new(config.clone())
        });
        registry
    }

    /// Register an action plugin factory
    pub fn register_action<P, F>(&mut self, name: impl Into<String>, spec: ActionSpec, factory: F)
    where
        P: ActionPlugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let name = name.into();
        trace!(action = %name, "Registering action plugin");
        self.actions.insert(
            name,
            Entry {
                factory: Arc::new(move || Box::new(factory()) as Box<dyn ActionPlugin>),
                spec: Arc::new(spec),
            },
        );
    }

    /// Register a lookup plugin factory
    pub fn register_lookup<P, F>(&mut self, name: impl Into<String>, spec: LookupSpec, factory: F)
    where
        P: LookupPlugin + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let name = name.into();
        trace!(lookup = %name, "Registering lookup plugin");
        self.lookups.insert(
            name,
            Entry {
                factory: Arc::new(move || Box::new(factory()) as Box<dyn LookupPlugin>),
                spec: Arc::new(spec),
            },
        );
    }

    /// Register a module
    pub fn register_module(&mut self, module: Arc<dyn Module>) {
        self.modules.register(module);
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn has_action(&self, name: &str) -> bool {
        resolve(&self.actions, name).is_some()
    }

    pub fn has_lookup(&self, name: &str) -> bool {
        resolve(&self.lookups, name).is_some()
    }

    /// Registered action names, sorted
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Registered lookup names, sorted
    pub fn lookup_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.lookups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate an action plugin with its spec
    pub fn action(&self, name: &str) -> Result<(Box<dyn ActionPlugin>, Arc<ActionSpec>)> {
        let entry = resolve(&self.actions, name).ok_or_else(|| Error::action_not_found(name))?;
        Ok(((entry.factory)(), entry.spec.clone()))
    }

    /// Instantiate a lookup plugin with its spec
    pub fn lookup(&self, name: &str) -> Result<(Box<dyn LookupPlugin>, Arc<LookupSpec>)> {
        let entry = resolve(&self.lookups, name).ok_or_else(|| Error::lookup_not_found(name))?;
        Ok(((entry.factory)(), entry.spec.clone()))
    }

    /// Locate and run an action plugin for `task`
    pub async fn run_action(
        self: &Arc<Self>,
        name: &str,
        task: Task,
        connection: Arc<dyn Connection>,
        config: Arc<Config>,
        task_vars: Option<&TaskVars>,
    ) -> Result<ExecutionResult> {
        let ctx = ActionContext::new(task, connection, self.clone(), config);
        self.run_action_in(name, ctx, task_vars).await
    }

    /// Run an action plugin on a prepared context, keeping its check mode
    pub async fn run_action_in(
        &self,
        name: &str,
        ctx: ActionContext,
        task_vars: Option<&TaskVars>,
    ) -> Result<ExecutionResult> {
        let (plugin, spec) = self.action(name)?;
        debug!(
            action = %name,
            task = %ctx.task().get_name(),
            check_mode = ctx.check_mode(),
            "Dispatching action"
        );

        let mut action = ActionBase::new(plugin, spec, ctx);
        action.run(task_vars).await
    }

    /// Locate and run a lookup plugin
    pub fn run_lookup(
        self: &Arc<Self>,
        name: &str,
        terms: &[Value],
        variables: Option<PluginArgs>,
        kwargs: &PluginArgs,
    ) -> Result<Vec<Value>> {
        let (plugin, spec) = self.lookup(name)?;
        debug!(lookup = %name, "Dispatching lookup");

        let ctx = LookupContext::new(name, self.clone());
        LookupBase::new(plugin, spec, ctx).run(terms, variables, kwargs)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("actions", &self.action_names())
            .field("lookups", &self.lookup_names())
            .field("modules", &self.modules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Constant(&'static str);

    impl LookupPlugin for Constant {
        fn run(
            &self,
            _ctx: &LookupContext,
            _terms: &[Value],
            _variables: &PluginArgs,
            _kwargs: &PluginArgs,
        ) -> Result<Vec<Value>> {
            Ok(vec![json!(self.0)])
        }
    }

    #[test]
    fn test_builtins() {
        let registry = PluginRegistry::with_builtins(Arc::new(Config::default()));
        assert!(registry.has_lookup("config"));
        assert!(registry.has_lookup("ansible.builtin.config"));
        assert!(registry.modules().contains("slurp"));
        assert!(registry.action_names().is_empty());
    }

    #[test]
    fn test_run_lookup_dispatches_by_name() {
        let mut registry = PluginRegistry::new();
        registry.register_lookup("my.ns.constant", LookupSpec::new(), || Constant("value"));
        let registry = Arc::new(registry);

        let out = registry
            .run_lookup("my.ns.constant", &[], None, &PluginArgs::new())
            .unwrap();
        assert_eq!(out, vec![json!("value")]);
    }

    #[test]
    fn test_unknown_plugins() {
        let registry = Arc::new(PluginRegistry::new());
        let err = registry
            .run_lookup("missing", &[], None, &PluginArgs::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unable to load lookup named \"missing\"");

        let err = registry.action("missing.action").err().unwrap();
        assert_eq!(err.to_string(), "Unable to load action named \"missing.action\"");
    }
}
