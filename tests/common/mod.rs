//! Shared fixtures for plugin-base integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use plugin_base::action::{ActionContext, ActionPlugin, ActionSpec};
use plugin_base::config::Config;
use plugin_base::connection::LocalConnection;
use plugin_base::error::Result;
use plugin_base::lookup::{LookupContext, LookupPlugin, LookupSpec};
use plugin_base::modules::{Module, ModuleContext, ModuleOutput, ModuleParams, ModuleResult};
use plugin_base::plugins::PluginRegistry;
use plugin_base::result::ExecutionResult;
use plugin_base::task::{PluginArgs, Task, TaskVars};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Documentation block of the file-management action used across suites
pub const FILE_MGMT_DOC: &str = r#"
module: file_mgmt
short_description: Manage files
options:
  path:
    type: path
    required: true
    aliases: [dest]
  state:
    type: str
    choices: [present, absent, link]
    default: present
  src:
    type: str
  content:
    type: str
  mode:
    type: str
  force:
    type: bool
    default: false
"#;

/// Config pointing the local and remote temp directories into `dir`
pub fn config_in(dir: &Path) -> Arc<Config> {
    Arc::new(Config {
        collections_paths: vec![dir.join("collections").display().to_string()],
        system_tmpdirs: vec![dir.join("tmp").display().to_string()],
        remote_tmp: dir.join("remote").display().to_string(),
        ..Config::default()
    })
}

pub fn connection() -> Arc<LocalConnection> {
    Arc::new(LocalConnection::with_identifier("testhost"))
}

pub fn args(pairs: &[(&str, Value)]) -> PluginArgs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Action context over a local connection and a registry with built-ins
pub fn action_context(task: Task, config: Arc<Config>, registry: PluginRegistry) -> ActionContext {
    ActionContext::new(task, connection(), Arc::new(registry), config)
}

/// Sets `my_result` and nothing else
pub struct SimpleAction;

#[async_trait]
impl ActionPlugin for SimpleAction {
    async fn run(
        &self,
        _ctx: &ActionContext,
        _task_vars: &TaskVars,
        mut result: ExecutionResult,
    ) -> Result<ExecutionResult> {
        result.insert("my_result", "a_result");
        Ok(result)
    }
}

/// Counts invocations and echoes its arguments under `args`
pub struct CountingAction {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionPlugin for CountingAction {
    async fn run(
        &self,
        ctx: &ActionContext,
        _task_vars: &TaskVars,
        mut result: ExecutionResult,
    ) -> Result<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        result.insert("args", Value::Object(ctx.args().clone().into_iter().collect()));
        Ok(result)
    }
}

/// Runs the module named by its `module` argument and merges the result
pub struct ModuleRunnerAction;

#[async_trait]
impl ActionPlugin for ModuleRunnerAction {
    async fn run(
        &self,
        ctx: &ActionContext,
        task_vars: &TaskVars,
        mut result: ExecutionResult,
    ) -> Result<ExecutionResult> {
        let module = ctx
            .args()
            .get("module")
            .and_then(Value::as_str)
            .unwrap_or("static")
            .to_string();
        ctx.execute_module_and_merge(
            Some(&module),
            Some(PluginArgs::new()),
            Some(task_vars),
            &mut result,
        )
        .await?;
        Ok(result)
    }
}

/// Calls the action named by its `target` argument
pub struct DispatchingAction;

#[async_trait]
impl ActionPlugin for DispatchingAction {
    async fn run(
        &self,
        ctx: &ActionContext,
        task_vars: &TaskVars,
        mut result: ExecutionResult,
    ) -> Result<ExecutionResult> {
        let target = ctx
            .args()
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let nested = ctx
            .execute_action(&target, args(&[("name", json!("nested"))]), Some(task_vars))
            .await?;
        result.insert("nested", nested.to_value());
        Ok(result)
    }
}

/// Reports the check mode it was run with
pub struct ReportModeAction;

#[async_trait]
impl ActionPlugin for ReportModeAction {
    async fn run(
        &self,
        ctx: &ActionContext,
        _task_vars: &TaskVars,
        mut result: ExecutionResult,
    ) -> Result<ExecutionResult> {
        result.insert("check_mode", ctx.check_mode());
        Ok(result)
    }
}

/// Returns `["my_result"]`
pub struct MyResultLookup;

impl LookupPlugin for MyResultLookup {
    fn run(
        &self,
        _ctx: &LookupContext,
        _terms: &[Value],
        _variables: &PluginArgs,
        _kwargs: &PluginArgs,
    ) -> Result<Vec<Value>> {
        Ok(vec![json!("my_result")])
    }
}

/// Returns its terms prefixed with the `prefix` variable
pub struct PrefixLookup;

impl LookupPlugin for PrefixLookup {
    fn run(
        &self,
        _ctx: &LookupContext,
        terms: &[Value],
        variables: &PluginArgs,
        _kwargs: &PluginArgs,
    ) -> Result<Vec<Value>> {
        let prefix = variables
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(terms
            .iter()
            .map(|t| json!(format!("{}{}", prefix, t.as_str().unwrap_or_default())))
            .collect())
    }
}

/// Module returning a fixed output, recording the task vars it was given
pub struct StaticModule {
    pub name: &'static str,
    pub output: IndexMap<String, Value>,
}

impl StaticModule {
    pub fn new(name: &'static str, output: Value) -> Self {
        let output = match output {
            Value::Object(map) => map.into_iter().collect(),
            _ => IndexMap::new(),
        };
        Self { name, output }
    }
}

#[async_trait]
impl Module for StaticModule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Returns a fixed result"
    }

    async fn execute(
        &self,
        _params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let mut output = self.output.clone();
        if !context.task_vars.is_empty() {
            output.insert("seen_vars".to_string(), json!(context.task_vars.len()));
        }
        Ok(output)
    }
}

/// Registry with the built-ins plus the sample plugins of this module
pub fn sample_registry(config: Arc<Config>) -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtins(config);
    registry.register_action("my.ns.simple", ActionSpec::new(), || SimpleAction);
    registry.register_action("my.ns.module_runner", ActionSpec::new(), || ModuleRunnerAction);
    registry.register_action("my.ns.dispatch", ActionSpec::new(), || DispatchingAction);
    registry.register_action("my.ns.report_mode", ActionSpec::new(), || ReportModeAction);
    registry.register_lookup("my.ns.my_lookup", LookupSpec::new(), || MyResultLookup);
    registry
}
