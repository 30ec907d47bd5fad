//! Action plugin contract.
//!
//! An action plugin implements [`ActionPlugin::run`] and is registered with
//! an immutable [`ActionSpec`]. [`ActionBase`] drives one invocation:
//!
//! 1. start from the `changed`/`skipped`/`failed` baseline;
//! 2. validate the task arguments against the documentation block, else the
//!    argument spec, when one is declared;
//! 3. on failure return the failed result without calling the plugin;
//! 4. otherwise hand the normalized arguments and the result to the plugin.
//!
//! Argument validation failures are data in the returned
//! [`ExecutionResult`]. Every other failure is an
//! [`Error`](crate::error::Error).
//!
//! Helpers available to plugins live on [`ActionContext`]; temp file and
//! remote mirroring helpers are in [`files`].

pub mod files;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Result;
use crate::lookup::Unsafe;
use crate::modules::ModuleContext;
use crate::path;
use crate::plugins::PluginRegistry;
use crate::result::ExecutionResult;
use crate::task::{PluginArgs, Task, TaskVars};
use crate::validation::{check_plugin_argspec, ArgumentSpec, CheckResult, Conditionals, Schema};

/// Declared inputs of an action plugin
#[derive(Debug, Clone, Default)]
pub struct ActionSpec {
    /// YAML documentation block; takes precedence over `argument_spec`
    pub documentation: Option<String>,
    pub argument_spec: Option<ArgumentSpec>,
    pub conditionals: Option<Conditionals>,
}

impl ActionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn with_argument_spec(mut self, spec: ArgumentSpec) -> Self {
        self.argument_spec = Some(spec);
        self
    }

    pub fn with_conditionals(mut self, conditionals: Conditionals) -> Self {
        self.conditionals = Some(conditionals);
        self
    }

    /// Schema used for validation, if any
    pub fn schema(&self) -> Option<Schema> {
        match (&self.documentation, &self.argument_spec) {
            (Some(doc), _) => Some(Schema::Doc(doc.clone())),
            (None, Some(spec)) => Some(Schema::ArgSpec(spec.clone())),
            (None, None) => None,
        }
    }
}

/// Trait that all action plugins must implement
#[async_trait]
pub trait ActionPlugin: Send + Sync {
    /// Plugin business logic.
    ///
    /// Called only once the arguments are valid; `ctx.args()` holds the
    /// normalized arguments. The returned result is the final outcome.
    async fn run(
        &self,
        ctx: &ActionContext,
        task_vars: &TaskVars,
        result: ExecutionResult,
    ) -> Result<ExecutionResult>;
}

/// Everything an action plugin can reach during one invocation
#[derive(Clone)]
pub struct ActionContext {
    task: Task,
    connection: Arc<dyn Connection>,
    registry: Arc<PluginRegistry>,
    config: Arc<Config>,
    check_mode: bool,
}

impl ActionContext {
    pub fn new(
        task: Task,
        connection: Arc<dyn Connection>,
        registry: Arc<PluginRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            task,
            connection,
            registry,
            config,
            check_mode: false,
        }
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Current task arguments (normalized once validation passed)
    pub fn args(&self) -> &PluginArgs {
        &self.task.args
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    /// Check arbitrary arguments, using the task name as plugin name
    pub fn check_argspec(
        &self,
        args: &PluginArgs,
        schema: &Schema,
        conditionals: Option<&Conditionals>,
        other_args: Option<&PluginArgs>,
    ) -> (CheckResult, PluginArgs) {
        check_plugin_argspec(self.task.get_name(), args, schema, conditionals, other_args)
    }

    /// Run a registered module and return its raw result.
    ///
    /// Defaults to the task action and the task arguments.
    pub async fn execute_module(
        &self,
        module_name: Option<&str>,
        module_args: Option<PluginArgs>,
        task_vars: Option<&TaskVars>,
    ) -> Result<IndexMap<String, Value>> {
        let name = module_name.unwrap_or(&self.task.action);
        let args = module_args.unwrap_or_else(|| self.task.args.clone());
        debug!(module = %name, host = %self.connection.identifier(), "Executing module");

        let context = ModuleContext::new(self.connection.clone())
            .with_check_mode(self.check_mode)
            .with_task_vars(task_vars.cloned().unwrap_or_default());
        let output = self.registry.modules().execute(name, &args, &context).await?;
        Ok(output)
    }

    /// Run a module and merge its result into `result`.
    ///
    /// The raw result is nested under the module name, or under the task
    /// name when no module name is given; special keys are lifted to the
    /// top level (see [`ExecutionResult::merge_module_result`]).
    pub async fn execute_module_and_merge(
        &self,
        module_name: Option<&str>,
        module_args: Option<PluginArgs>,
        task_vars: Option<&TaskVars>,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let raw = self.execute_module(module_name, module_args, task_vars).await?;
        let key = module_name.unwrap_or_else(|| self.task.get_name());
        result.merge_module_result(key, raw);
        Ok(())
    }

    /// Run another registered action with the same connection, registry,
    /// config and check mode, on a copy of the task carrying `args`.
    pub async fn execute_action(
        &self,
        name: &str,
        args: PluginArgs,
        task_vars: Option<&TaskVars>,
    ) -> Result<ExecutionResult> {
        let mut task = self.task.clone();
        task.args = args;

        let ctx = ActionContext::new(
            task,
            self.connection.clone(),
            self.registry.clone(),
            self.config.clone(),
        )
        .with_check_mode(self.check_mode);
        self.registry.run_action_in(name, ctx, task_vars).await
    }

    /// Run a registered lookup. Its variables are the task arguments
    /// overlaid with `variables`.
    pub fn execute_lookup(
        &self,
        name: &str,
        terms: &[Value],
        variables: Option<&PluginArgs>,
        kwargs: &PluginArgs,
    ) -> Result<Unsafe<Vec<Value>>> {
        let mut lookup_vars = self.task.args.clone();
        if let Some(variables) = variables {
            lookup_vars.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        self.registry
            .run_lookup(name, terms, Some(lookup_vars), kwargs)
            .map(Unsafe)
    }

    /// Find a file in a collection and the task search path
    pub fn find_needle_in_collection(
        &self,
        full_name: &str,
        dirname: &str,
        needle: &str,
        collection_first: bool,
    ) -> Result<PathBuf> {
        path::find_needle_in_collection(
            &self.registry,
            &self.task.search_path,
            full_name,
            dirname,
            needle,
            collection_first,
        )
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("task", &self.task)
            .field("connection", &self.connection.identifier())
            .field("check_mode", &self.check_mode)
            .finish_non_exhaustive()
    }
}

/// Runner that validates arguments before invoking an action plugin
pub struct ActionBase {
    plugin: Box<dyn ActionPlugin>,
    spec: Arc<ActionSpec>,
    ctx: ActionContext,
}

impl ActionBase {
    pub fn new(plugin: Box<dyn ActionPlugin>, spec: Arc<ActionSpec>, ctx: ActionContext) -> Self {
        Self { plugin, spec, ctx }
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    pub fn into_context(self) -> ActionContext {
        self.ctx
    }

    /// Check arbitrary arguments, using the task name as plugin name
    pub fn check_argspec(
        &self,
        args: &PluginArgs,
        schema: &Schema,
        conditionals: Option<&Conditionals>,
        other_args: Option<&PluginArgs>,
    ) -> (CheckResult, PluginArgs) {
        self.ctx.check_argspec(args, schema, conditionals, other_args)
    }

    /// Validate the declared arguments, returning the failed check when
    /// validation did not pass.
    fn validate_args(&mut self, result: &mut ExecutionResult) -> Option<CheckResult> {
        let schema = self.spec.schema()?;
        let (check, normalized) = self.ctx.check_argspec(
            &self.ctx.task.args,
            &schema,
            self.spec.conditionals.as_ref(),
            None,
        );

        if check.failed {
            return Some(check);
        }

        self.ctx.task.args = normalized;
        result.merge_check_result(&check);
        None
    }

    /// Run one invocation
    pub async fn run(&mut self, task_vars: Option<&TaskVars>) -> Result<ExecutionResult> {
        let empty = TaskVars::new();
        let task_vars = task_vars.unwrap_or(&empty);

        let mut result = ExecutionResult::baseline();

        if let Some(check) = self.validate_args(&mut result) {
            info!(
                task = %self.ctx.task.get_name(),
                errors = check.errors.len(),
                "Action arguments are invalid"
            );
            let msg = check.msg.unwrap_or_default();
            result.mark_failed(check.errors, msg);
            return Ok(result);
        }

        debug!(task = %self.ctx.task.get_name(), "Running action");
        let result = self.plugin.run(&self.ctx, task_vars, result).await?;

        if result.is_failed() {
            debug!(task = %self.ctx.task.get_name(), "Action reported failure");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::LocalConnection;
    use crate::validation::{OptionSpec, OptionType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ActionPlugin for Recorder {
        async fn run(
            &self,
            ctx: &ActionContext,
            _task_vars: &TaskVars,
            mut result: ExecutionResult,
        ) -> Result<ExecutionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            result.insert("seen_args", Value::Object(ctx.args().clone().into_iter().collect()));
            Ok(result)
        }
    }

    fn action_base(spec: ActionSpec, task: Task, calls: Arc<AtomicUsize>) -> ActionBase {
        let config = Arc::new(Config::default());
        let ctx = ActionContext::new(
            task,
            Arc::new(LocalConnection::with_identifier("test")),
            Arc::new(PluginRegistry::with_builtins(config.clone())),
            config,
        );
        ActionBase::new(Box::new(Recorder { calls }), Arc::new(spec), ctx)
    }

    #[test]
    fn test_spec_schema_prefers_documentation() {
        let spec = ActionSpec::new()
            .with_argument_spec(ArgumentSpec::new())
            .with_documentation("options: {}");
        assert!(matches!(spec.schema(), Some(Schema::Doc(_))));
        assert!(ActionSpec::new().schema().is_none());
    }

    #[tokio::test]
    async fn test_valid_args_are_normalized_before_plugin_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = ActionSpec::new().with_argument_spec(
            ArgumentSpec::new()
                .option("name", OptionSpec::new(OptionType::Str).required())
                .option("path", OptionSpec::new(OptionType::Str).with_default("default_path")),
        );
        let task = Task::new("simple_with_param").with_arg("name", "n");

        let mut base = action_base(spec, task, calls.clone());
        let result = base.run(None).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.to_value(),
            json!({
                "changed": false,
                "skipped": false,
                "failed": false,
                "errors": [],
                "seen_args": {"name": "n", "path": "default_path"}
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_args_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = ActionSpec::new().with_argument_spec(
            ArgumentSpec::new().option("name", OptionSpec::new(OptionType::Str).required()),
        );

        let mut base = action_base(spec, Task::new("needs_name"), calls.clone());
        let result = base.run(None).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(result.is_failed());
        assert_eq!(result["errors"], json!(["missing required arguments: name"]));
        assert_eq!(
            result["msg"],
            json!("Errors during argspec validation for needs_name plugin")
        );
    }

    #[tokio::test]
    async fn test_execute_lookup_overlays_variables_on_task_args() {
        let calls = Arc::new(AtomicUsize::new(0));
        let task = Task::new("t").with_arg("a", 1).with_arg("b", 1);
        let base = action_base(ActionSpec::new(), task, calls);
        let ctx = base.into_context();

        let mut vars = PluginArgs::new();
        vars.insert("b".to_string(), json!(2));
        let err = ctx
            .execute_lookup("nope", &[], Some(&vars), &PluginArgs::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "Unable to load lookup named \"nope\"");

        let out = ctx
            .execute_lookup("config", &[json!("REMOTE_TMP")], Some(&vars), &PluginArgs::new())
            .unwrap();
        assert_eq!(out.into_inner(), vec![json!("~/.ansible/tmp")]);
    }
}
