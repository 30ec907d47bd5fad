//! Schema validators.
//!
//! [`SchemaValidator`] is the raw validator contract: it may report its
//! errors as nothing, one string or a list, and its normalized output may be
//! any value. [`ArgSpecValidator`] is the built-in implementation.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use std::collections::HashMap;
use tracing::trace;

use super::{
    deserialize_flexible_bool, ArgumentSpec, Conditionals, OptionSpec, OptionType, Schema,
};
use crate::result::deep_merge;
use crate::task::PluginArgs;

/// Keys accepted in a schema envelope
const VALID_ENVELOPE_KEYS: &[&str] = &[
    "argument_spec",
    "mutually_exclusive",
    "required_together",
    "required_one_of",
    "required_if",
    "required_by",
    "supports_check_mode",
    "bypass_checks",
    "no_log",
    "add_file_common_args",
];

/// Errors as a raw validator reports them
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawErrors {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

/// Raw outcome of a validator run
#[derive(Debug, Clone, PartialEq)]
pub struct RawValidation {
    pub valid: bool,
    pub errors: RawErrors,
    /// Normalized arguments; a mapping unless the validator misbehaves
    pub updated: Value,
}

impl RawValidation {
    fn valid(updated: Value) -> Self {
        Self {
            valid: true,
            errors: RawErrors::None,
            updated,
        }
    }

    fn invalid(errors: Vec<String>, updated: Value) -> Self {
        Self {
            valid: false,
            errors: RawErrors::Many(errors),
            updated,
        }
    }
}

/// Input of a validator run
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    /// Name used in messages
    pub name: &'a str,
    pub args: &'a PluginArgs,
    pub schema: &'a Schema,
    pub conditionals: Option<&'a Conditionals>,
    /// Extra validator keywords merged into the schema envelope
    pub other_args: Option<&'a PluginArgs>,
}

/// Raw schema validator contract
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, request: ValidationRequest<'_>) -> RawValidation;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    argument_spec: ArgumentSpec,
    #[serde(deserialize_with = "deserialize_flexible_bool")]
    bypass_checks: bool,
    #[serde(deserialize_with = "deserialize_flexible_bool")]
    supports_check_mode: bool,
    #[serde(deserialize_with = "deserialize_flexible_bool")]
    no_log: bool,
    #[serde(deserialize_with = "deserialize_flexible_bool")]
    add_file_common_args: bool,
}

/// Built-in validator for argument specifications and documentation blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgSpecValidator;

impl ArgSpecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Build the schema envelope: options, then conditionals, then extra
    /// validator keywords, each deep-merged over the previous layer.
    fn build_envelope(
        schema: &Schema,
        conditionals: Option<&Conditionals>,
        other_args: Option<&PluginArgs>,
    ) -> Result<Value, String> {
        let argument_spec = match schema {
            Schema::Doc(doc) => {
                let parsed: serde_yaml::Value = serde_yaml::from_str(doc)
                    .map_err(|e| format!("Invalid schema. Unable to parse documentation: {}", e))?;
                let parsed = serde_json::to_value(parsed)
                    .map_err(|e| format!("Invalid schema. Unable to parse documentation: {}", e))?;
                match parsed.get("options") {
                    Some(Value::Null) | None => json!({}),
                    Some(options) => options.clone(),
                }
            }
            Schema::ArgSpec(spec) => {
                serde_json::to_value(spec).map_err(|e| format!("Invalid schema. {}", e))?
            }
        };

        let mut envelope = json!({ "argument_spec": argument_spec });

        if let Some(conditionals) = conditionals {
            let value =
                serde_json::to_value(conditionals).map_err(|e| format!("Invalid schema. {}", e))?;
            deep_merge(&mut envelope, value);
        }

        if let Some(other_args) = other_args {
            let value = Value::Object(other_args.clone().into_iter().collect());
            deep_merge(&mut envelope, value);
        }

        Ok(envelope)
    }

    fn check_envelope_keys(envelope: &Value) -> Result<(), String> {
        let mut invalid: Vec<&str> = envelope
            .as_object()
            .map(|m| {
                m.keys()
                    .map(String::as_str)
                    .filter(|k| !VALID_ENVELOPE_KEYS.contains(k))
                    .collect()
            })
            .unwrap_or_default();

        if invalid.is_empty() {
            return Ok(());
        }
        invalid.sort_unstable();
        Err(format!(
            "Invalid schema. Invalid keys found: {}",
            invalid.join(", ")
        ))
    }

    /// Validate `args` against a parsed specification.
    ///
    /// Returns every error found plus the normalized arguments.
    pub fn validate_spec(
        &self,
        args: &PluginArgs,
        spec: &ArgumentSpec,
        conditionals: &Conditionals,
    ) -> (Vec<String>, PluginArgs) {
        let mut errors = Vec::new();

        let mut params = resolve_aliases(args, spec);
        check_unsupported(&mut params, spec, &mut errors);
        check_mutually_exclusive(&params, conditionals, &mut errors);
        apply_defaults(&mut params, spec);
        check_required(&params, spec, &mut errors);
        coerce_types(&mut params, spec, &mut errors);
        check_choices(&params, spec, &mut errors);
        check_required_together(&params, conditionals, &mut errors);
        check_required_one_of(&params, conditionals, &mut errors);
        check_required_if(&params, conditionals, &mut errors);
        check_required_by(&params, conditionals, &mut errors);

        for name in spec.names() {
            if !params.contains_key(name) {
                params.insert(name.to_string(), Value::Null);
            }
        }

        (errors, params)
    }
}

impl SchemaValidator for ArgSpecValidator {
    fn validate(&self, request: ValidationRequest<'_>) -> RawValidation {
        let original = Value::Object(request.args.clone().into_iter().collect());

        let envelope = match Self::build_envelope(
            request.schema,
            request.conditionals,
            request.other_args,
        )
        .and_then(|envelope| Self::check_envelope_keys(&envelope).map(|_| envelope))
        {
            Ok(envelope) => envelope,
            Err(e) => return RawValidation::invalid(vec![e], original),
        };

        let parsed: Envelope = match serde_json::from_value(envelope.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return RawValidation::invalid(vec![format!("Invalid schema. {}", e)], original),
        };
        let conditionals: Conditionals = match serde_json::from_value(envelope) {
            Ok(conditionals) => conditionals,
            Err(e) => return RawValidation::invalid(vec![format!("Invalid schema. {}", e)], original),
        };

        if parsed.bypass_checks {
            trace!(name = %request.name, "Argument checks bypassed");
            return RawValidation::valid(original);
        }

        let (errors, params) = self.validate_spec(request.args, &parsed.argument_spec, &conditionals);
        let updated = Value::Object(params.into_iter().collect());

        if errors.is_empty() {
            RawValidation::valid(updated)
        } else {
            RawValidation::invalid(errors, updated)
        }
    }
}

fn is_present(params: &PluginArgs, key: &str) -> bool {
    params.get(key).map_or(false, |v| !v.is_null())
}

fn resolve_aliases(args: &PluginArgs, spec: &ArgumentSpec) -> PluginArgs {
    let aliases: HashMap<&str, &str> = spec
        .iter()
        .flat_map(|(name, opt)| opt.aliases.iter().map(move |a| (a.as_str(), name.as_str())))
        .collect();

    let mut params = PluginArgs::new();
    for (key, value) in args {
        match aliases.get(key.as_str()) {
            Some(canonical) if spec.get(key).is_none() => {
                // the canonical name wins when both are given
                if !args.contains_key(*canonical) {
                    params.insert((*canonical).to_string(), value.clone());
                }
            }
            _ => {
                params.insert(key.clone(), value.clone());
            }
        }
    }
    params
}

fn supported_parameters(spec: &ArgumentSpec) -> String {
    let mut names: Vec<(&str, &OptionSpec)> = spec.iter().map(|(k, v)| (k.as_str(), v)).collect();
    names.sort_unstable_by_key(|(name, _)| *name);
    names
        .into_iter()
        .map(|(name, opt)| {
            if opt.aliases.is_empty() {
                name.to_string()
            } else {
                let mut aliases: Vec<&str> = opt.aliases.iter().map(String::as_str).collect();
                aliases.sort_unstable();
                format!("{} ({})", name, aliases.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_unsupported(params: &mut PluginArgs, spec: &ArgumentSpec, errors: &mut Vec<String>) {
    let mut unsupported: Vec<String> = params
        .keys()
        .filter(|k| spec.get(k).is_none())
        .cloned()
        .collect();
    if unsupported.is_empty() {
        return;
    }
    unsupported.sort_unstable();
    errors.push(format!(
        "{}. Supported parameters include: {}.",
        unsupported.join(", "),
        supported_parameters(spec)
    ));
    params.retain(|k, _| spec.get(k).is_some());
}

fn check_mutually_exclusive(
    params: &PluginArgs,
    conditionals: &Conditionals,
    errors: &mut Vec<String>,
) {
    let failing: Vec<String> = conditionals
        .mutually_exclusive
        .iter()
        .filter(|group| group.iter().filter(|k| is_present(params, k)).count() > 1)
        .map(|group| group.join("|"))
        .collect();
    if !failing.is_empty() {
        errors.push(format!(
            "parameters are mutually exclusive: {}",
            failing.join(", ")
        ));
    }
}

fn apply_defaults(params: &mut PluginArgs, spec: &ArgumentSpec) {
    for (name, opt) in spec.iter() {
        if let Some(default) = opt.default.as_ref().filter(|d| !d.is_null()) {
            if !is_present(params, name) {
                params.insert(name.clone(), default.clone());
            }
        }
    }
}

fn check_required(params: &PluginArgs, spec: &ArgumentSpec, errors: &mut Vec<String>) {
    let mut missing: Vec<&str> = spec
        .iter()
        .filter(|(name, opt)| opt.required && !is_present(params, name))
        .map(|(name, _)| name.as_str())
        .collect();
    if missing.is_empty() {
        return;
    }
    missing.sort_unstable();
    errors.push(format!("missing required arguments: {}", missing.join(", ")));
}

fn coerce_types(params: &mut PluginArgs, spec: &ArgumentSpec, errors: &mut Vec<String>) {
    for (name, opt) in spec.iter() {
        let value = match params.get(name) {
            Some(v) if !v.is_null() => v.clone(),
            _ => continue,
        };

        let mut coerced = match coerce(&value, opt.option_type) {
            Ok(coerced) => coerced,
            Err(reason) => {
                errors.push(format!(
                    "argument '{}' is of type {} and we were unable to convert to {}: {}",
                    name,
                    python_type(&value),
                    opt.option_type,
                    reason
                ));
                continue;
            }
        };

        if let (Some(elements), Value::Array(items)) = (opt.elements, &mut coerced) {
            for item in items.iter_mut().filter(|i| !i.is_null()) {
                match coerce(item, elements) {
                    Ok(converted) => *item = converted,
                    Err(reason) => errors.push(format!(
                        "Elements value for option '{}' is of type {} and we were unable to convert to {}: {}",
                        name,
                        python_type(item),
                        elements,
                        reason
                    )),
                }
            }
        }

        params.insert(name.clone(), coerced);
    }
}

fn check_choices(params: &PluginArgs, spec: &ArgumentSpec, errors: &mut Vec<String>) {
    for (name, opt) in spec.iter() {
        let (choices, value) = match (&opt.choices, params.get(name)) {
            (Some(choices), Some(value)) if !value.is_null() => (choices, value),
            _ => continue,
        };
        let allowed = choices
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", ");

        match value {
            Value::Array(items) => {
                let unmatched: Vec<String> = items
                    .iter()
                    .filter(|item| !choices.iter().any(|c| values_match(c, item)))
                    .map(display_value)
                    .collect();
                if !unmatched.is_empty() {
                    errors.push(format!(
                        "value of {} must be one or more of: {}. Got no match for: {}",
                        name,
                        allowed,
                        unmatched.join(", ")
                    ));
                }
            }
            other => {
                if !choices.iter().any(|c| values_match(c, other)) {
                    errors.push(format!(
                        "value of {} must be one of: {}, got: {}",
                        name,
                        allowed,
                        display_value(other)
                    ));
                }
            }
        }
    }
}

fn check_required_together(
    params: &PluginArgs,
    conditionals: &Conditionals,
    errors: &mut Vec<String>,
) {
    let failing = conditionals.required_together.iter().find(|group| {
        let count = group.iter().filter(|k| is_present(params, k)).count();
        count > 0 && count < group.len()
    });
    if let Some(group) = failing {
        errors.push(format!(
            "parameters are required together: {}",
            group.join(", ")
        ));
    }
}

fn check_required_one_of(params: &PluginArgs, conditionals: &Conditionals, errors: &mut Vec<String>) {
    let failing = conditionals
        .required_one_of
        .iter()
        .find(|group| !group.iter().any(|k| is_present(params, k)));
    if let Some(group) = failing {
        errors.push(format!(
            "one of the following is required: {}",
            group.join(", ")
        ));
    }
}

fn check_required_if(params: &PluginArgs, conditionals: &Conditionals, errors: &mut Vec<String>) {
    for rule in &conditionals.required_if {
        let matches = params
            .get(&rule.key)
            .map_or(false, |v| !v.is_null() && values_match(&rule.value, v));
        if !matches {
            continue;
        }

        let missing: Vec<&str> = rule
            .requirements
            .iter()
            .filter(|k| !is_present(params, k))
            .map(String::as_str)
            .collect();
        let failed = if rule.is_one_of {
            missing.len() == rule.requirements.len() && !missing.is_empty()
        } else {
            !missing.is_empty()
        };

        if failed {
            errors.push(format!(
                "{} is {} but {} of the following are missing: {}",
                rule.key,
                display_value(&rule.value),
                if rule.is_one_of { "any" } else { "all" },
                missing.join(", ")
            ));
            return;
        }
    }
}

fn check_required_by(params: &PluginArgs, conditionals: &Conditionals, errors: &mut Vec<String>) {
    for (key, requirements) in &conditionals.required_by {
        if !is_present(params, key) {
            continue;
        }
        let missing: Vec<&str> = requirements
            .iter()
            .filter(|k| !is_present(params, k))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            errors.push(format!(
                "missing parameter(s) required by '{}': {}",
                key,
                missing.join(", ")
            ));
            return;
        }
    }
}

/// Equality with a fallback on the rendered form, so `1` matches `"1"`
fn values_match(expected: &Value, actual: &Value) -> bool {
    expected == actual || display_value(expected) == display_value(actual)
}

/// Render a value the way validation messages show it
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn python_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "<class 'NoneType'>",
        Value::Bool(_) => "<class 'bool'>",
        Value::Number(n) if n.is_f64() => "<class 'float'>",
        Value::Number(_) => "<class 'int'>",
        Value::String(_) => "<class 'str'>",
        Value::Array(_) => "<class 'list'>",
        Value::Object(_) => "<class 'dict'>",
    }
}

const TRUE_STRINGS: &[&str] = &["y", "yes", "on", "1", "true", "t"];
const FALSE_STRINGS: &[&str] = &["n", "no", "off", "0", "false", "f", ""];

fn coerce(value: &Value, option_type: OptionType) -> Result<Value, String> {
    match option_type {
        OptionType::Raw => Ok(value.clone()),
        OptionType::Str => coerce_str(value).map(Value::String),
        OptionType::Bool => coerce_bool(value).map(Value::Bool),
        OptionType::Int => coerce_int(value),
        OptionType::Float => coerce_float(value),
        OptionType::List => coerce_list(value),
        OptionType::Dict => coerce_dict(value),
        OptionType::Path => {
            coerce_str(value).map(|s| Value::String(crate::config::expand_path(&s).display().to_string()))
        }
        OptionType::Json => coerce_json(value),
    }
}

fn coerce_str(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(display_value(value)),
        other => Err(format!(
            "{} cannot be converted to a string",
            other
        )),
    }
}

fn coerce_bool(value: &Value) -> Result<bool, String> {
    let invalid = || {
        format!(
            "The value '{}' is not a valid boolean. Valid booleans include: {}",
            display_value(value),
            TRUE_STRINGS
                .iter()
                .chain(FALSE_STRINGS.iter().filter(|s| !s.is_empty()))
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if TRUE_STRINGS.contains(&lowered.as_str()) {
                Ok(true)
            } else if FALSE_STRINGS.contains(&lowered.as_str()) {
                Ok(false)
            } else {
                Err(invalid())
            }
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Ok(true),
            Some(f) if f == 0.0 => Ok(false),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

fn coerce_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(json!(f as i64)),
            _ => Err(format!("{} cannot be converted to an int", n)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| json!(i))
            .map_err(|_| format!("invalid literal for int() with base 10: '{}'", s)),
        other => Err(format!("{} cannot be converted to an int", display_value(other))),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    let float = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    float
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("{} cannot be converted to a float", display_value(value)))
}

fn coerce_list(value: &Value) -> Result<Value, String> {
    match value {
        Value::Array(_) => Ok(value.clone()),
        Value::String(s) => Ok(Value::Array(
            s.split(',').map(|item| Value::String(item.to_string())).collect(),
        )),
        Value::Number(_) | Value::Bool(_) => Ok(json!([display_value(value)])),
        other => Err(format!("{} cannot be converted to a list", other)),
    }
}

fn coerce_dict(value: &Value) -> Result<Value, String> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(s) if s.trim_start().starts_with('{') => {
            serde_json::from_str::<Map<String, Value>>(s)
                .map(Value::Object)
                .map_err(|_| "unable to evaluate string as dictionary".to_string())
        }
        Value::String(s) => {
            let mut map = IndexMap::new();
            for pair in s.split(|c: char| c == ',' || c.is_whitespace()) {
                if pair.is_empty() {
                    continue;
                }
                let (key, val) = pair.split_once('=').ok_or_else(|| {
                    "dictionary requested, could not parse JSON or key=value".to_string()
                })?;
                map.insert(key.trim().to_string(), Value::String(val.trim().to_string()));
            }
            Ok(Value::Object(map.into_iter().collect()))
        }
        other => Err(format!(
            "{} cannot be converted to a dict",
            display_value(other)
        )),
    }
}

fn coerce_json(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        Value::Array(_) | Value::Object(_) => Ok(Value::String(value.to_string())),
        other => Err(format!(
            "{} cannot be converted to a json string",
            display_value(other)
        )),
    }
}
