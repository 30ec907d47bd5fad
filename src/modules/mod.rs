//! Module system for plugin-base
//!
//! Modules are the units of work an action plugin runs on the managed node
//! through [`execute_module`](crate::action::ActionContext::execute_module).
//! A module returns a raw result mapping; merging it into the action result
//! is the caller's business.

pub mod slurp;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::connection::{Connection, ConnectionError};
use crate::task::TaskVars;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

impl From<ModuleError> for crate::error::Error {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::NotFound(name) => crate::error::Error::ModuleNotFound(name),
            ModuleError::Connection(e) => crate::error::Error::Connection(e),
            other => crate::error::Error::ActionFail(other.to_string()),
        }
    }
}

/// Module parameters
pub type ModuleParams = IndexMap<String, Value>;

/// Raw module result mapping
pub type ModuleOutput = IndexMap<String, Value>;

/// Context handed to a module invocation
#[derive(Clone)]
pub struct ModuleContext {
    /// Connection to the managed node
    pub connection: Arc<dyn Connection>,
    /// Whether the module should avoid making changes
    pub check_mode: bool,
    /// Variables of the calling task
    pub task_vars: TaskVars,
}

impl ModuleContext {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            check_mode: false,
            task_vars: TaskVars::new(),
        }
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_task_vars(mut self, task_vars: TaskVars) -> Self {
        self.task_vars = task_vars;
        self
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("connection", &self.connection.identifier())
            .field("check_mode", &self.check_mode)
            .field("task_vars", &self.task_vars.len())
            .finish()
    }
}

/// Trait implemented by every module
#[async_trait]
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Returns the list of required parameters
    fn required_params(&self) -> &[&'static str] {
        &[]
    }

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        for name in self.required_params() {
            if params.get(*name).map_or(true, Value::is_null) {
                return Err(ModuleError::MissingParameter((*name).to_string()));
            }
        }
        Ok(())
    }

    /// Execute the module with the given parameters
    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput>;
}

/// Registry for looking up modules by name
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(slurp::SlurpModule));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name.
    ///
    /// A fully qualified name (`ns.collection.slurp`) falls back to its last
    /// segment when it is not registered as is.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned().or_else(|| {
            name.rsplit_once('.')
                .and_then(|(_, short)| self.modules.get(short).cloned())
        })
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    pub async fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self
            .get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))?;

        module.validate_params(params)?;
        module.execute(params, context).await
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
