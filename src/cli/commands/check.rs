//! Check command
//!
//! Runs the argument checker of action plugins outside of any engine:
//! a schema file, arguments from a file and/or `-a key=value` pairs.

use super::CommandContext;
use crate::cli::output::CheckStatus;
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use plugin_base::task::PluginArgs;
use plugin_base::validation::{check_plugin_argspec, ArgumentSpec, Conditionals, Schema};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// Schema file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemaFileFormat {
    /// YAML documentation block with an `options:` section
    Doc,
    /// Argument spec mapping, bare or under an `argument_spec` key
    #[default]
    Argspec,
}

/// Arguments for the check command
#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    /// Schema file
    #[arg(long, short = 's')]
    pub schema: PathBuf,

    /// Schema file format
    #[arg(long, short = 'f', default_value = "argspec")]
    pub format: SchemaFileFormat,

    /// YAML or JSON file holding the arguments
    #[arg(long)]
    pub args: Option<PathBuf>,

    /// Single argument (key=value), applied over --args
    #[arg(short = 'a', long = "arg", action = clap::ArgAction::Append)]
    pub arg: Vec<String>,

    /// YAML or JSON file holding the conditionals
    #[arg(long)]
    pub conditionals: Option<PathBuf>,

    /// Plugin name used in messages (defaults to the schema file stem)
    #[arg(long)]
    pub name: Option<String>,
}

/// Read a YAML or JSON mapping; an empty document is an empty mapping
fn read_mapping(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        _ => bail!("{} does not hold a mapping", path.display()),
    }
}

impl CheckArgs {
    fn plugin_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.schema
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "check".to_string())
        })
    }

    /// Load the schema and the extra validator keywords found next to it
    fn load_schema(&self) -> Result<(Schema, Option<PluginArgs>)> {
        match self.format {
            SchemaFileFormat::Doc => {
                let doc = std::fs::read_to_string(&self.schema)
                    .with_context(|| format!("Failed to read {}", self.schema.display()))?;
                Ok((Schema::Doc(doc), None))
            }
            SchemaFileFormat::Argspec => {
                let mut mapping = read_mapping(&self.schema)?;
                let (spec, rest) = match mapping.remove("argument_spec") {
                    Some(spec) => (spec, mapping),
                    None => (Value::Object(mapping), Map::new()),
                };

                let spec: ArgumentSpec = serde_json::from_value(spec)
                    .with_context(|| format!("Invalid argument spec in {}", self.schema.display()))?;
                let other_args = (!rest.is_empty()).then(|| rest.into_iter().collect());
                Ok((Schema::ArgSpec(spec), other_args))
            }
        }
    }

    fn load_args(&self) -> Result<PluginArgs> {
        let mut args: PluginArgs = match &self.args {
            Some(path) => read_mapping(path)?.into_iter().collect(),
            None => PluginArgs::new(),
        };

        for pair in &self.arg {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("Invalid argument '{}': expected key=value", pair);
            };
            args.insert(key.trim().to_string(), Value::String(value.to_string()));
        }
        Ok(args)
    }

    fn load_conditionals(&self) -> Result<Option<Conditionals>> {
        let Some(path) = &self.conditionals else {
            return Ok(None);
        };
        let mapping = read_mapping(path)?;
        let conditionals = serde_json::from_value(Value::Object(mapping))
            .with_context(|| format!("Invalid conditionals in {}", path.display()))?;
        Ok(Some(conditionals))
    }

    /// Execute the check command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let name = self.plugin_name();
        let (schema, other_args) = self.load_schema()?;
        let args = self.load_args()?;
        let conditionals = self.load_conditionals()?;

        ctx.output.info(&format!(
            "Checking {} argument(s) against {} schema {}",
            args.len(),
            schema.format(),
            self.schema.display()
        ));

        let (check, normalized) = check_plugin_argspec(
            &name,
            &args,
            &schema,
            conditionals.as_ref(),
            other_args.as_ref(),
        );
        let normalized = Value::Object(normalized.into_iter().collect());

        if ctx.output.is_json() {
            ctx.output
                .document(&json!({ "result": check, "normalized": normalized }));
        } else {
            if check.failed {
                ctx.output.status(&name, CheckStatus::Invalid);
                if let Some(msg) = &check.msg {
                    ctx.output.error(msg);
                }
                ctx.output.list("Errors", &check.errors);
            } else {
                ctx.output.status(&name, CheckStatus::Valid);
            }
            ctx.output.document(&normalized);
        }
        ctx.output.flush();

        Ok(if check.failed { 2 } else { 0 })
    }
}
