//! Stable argument-checking contract on top of a [`SchemaValidator`].
//!
//! Whatever the validator returns, callers always get a boolean, a list of
//! error strings (empty iff valid) and a mapping of normalized arguments.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::validator::{ArgSpecValidator, RawErrors, SchemaValidator, ValidationRequest};
use super::{Conditionals, Schema};
use crate::task::PluginArgs;

/// Matches the validator's unsupported-parameter message
static UNSUPPORTED_PARAMETERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s,]+(, [^\s,]+)?\. Supported parameters include: .*\.$")
        .expect("Invalid unsupported parameters regex")
});

const UNKNOWN_VALIDATION_ERROR: &str = "unknown validation error";

/// Normalized outcome of a check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Non-empty iff `valid` is false
    pub errors: Vec<String>,
    pub normalized: PluginArgs,
}

/// Checker output in the shape merged into an execution result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub errors: Vec<String>,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Wraps a validator and normalizes its output
#[derive(Debug, Clone, Default)]
pub struct ArgSpecChecker<V = ArgSpecValidator> {
    validator: V,
}

impl<V: SchemaValidator> ArgSpecChecker<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

    /// Validate `args` against `schema` and normalize the outcome.
    pub fn check_argspec(
        &self,
        name: &str,
        args: &PluginArgs,
        schema: &Schema,
        conditionals: Option<&Conditionals>,
        other_args: Option<&PluginArgs>,
    ) -> ValidationOutcome {
        let raw = self.validator.validate(ValidationRequest {
            name,
            args,
            schema,
            conditionals,
            other_args,
        });

        let errors = if raw.valid {
            Vec::new()
        } else {
            match raw.errors {
                RawErrors::Many(errors) if !errors.is_empty() => errors,
                RawErrors::One(error) => vec![error],
                RawErrors::Many(_) | RawErrors::None => vec![UNKNOWN_VALIDATION_ERROR.to_string()],
            }
        };

        let normalized = match raw.updated {
            Value::Object(map) => map.into_iter().collect(),
            _ => PluginArgs::new(),
        };

        ValidationOutcome {
            valid: raw.valid,
            errors,
            normalized,
        }
    }

    /// Check the arguments of a plugin and shape the outcome for merging
    /// into an execution result.
    pub fn check_plugin_argspec(
        &self,
        plugin_name: &str,
        args: &PluginArgs,
        schema: &Schema,
        conditionals: Option<&Conditionals>,
        other_args: Option<&PluginArgs>,
    ) -> (CheckResult, PluginArgs) {
        debug!(plugin = %plugin_name, format = %schema.format(), "Checking plugin arguments");

        let outcome = self.check_argspec(plugin_name, args, schema, conditionals, other_args);

        if outcome.valid {
            return (CheckResult::default(), outcome.normalized);
        }

        debug!(plugin = %plugin_name, errors = outcome.errors.len(), "Argument validation failed");
        let result = CheckResult {
            errors: rewrite_unsupported_parameters(outcome.errors),
            failed: true,
            msg: Some(format!(
                "Errors during argspec validation for {} plugin",
                plugin_name
            )),
        };
        (result, outcome.normalized)
    }
}

/// Prefix every unsupported-parameter message with `Unsupported parameters: `
pub fn rewrite_unsupported_parameters(errors: Vec<String>) -> Vec<String> {
    errors
        .into_iter()
        .map(|error| {
            if UNSUPPORTED_PARAMETERS.is_match(&error) {
                format!("Unsupported parameters: {}", error)
            } else {
                error
            }
        })
        .collect()
}

/// [`ArgSpecChecker::check_argspec`] with the built-in validator
pub fn check_argspec(
    name: &str,
    args: &PluginArgs,
    schema: &Schema,
    conditionals: Option<&Conditionals>,
    other_args: Option<&PluginArgs>,
) -> ValidationOutcome {
    ArgSpecChecker::<ArgSpecValidator>::default().check_argspec(
        name,
        args,
        schema,
        conditionals,
        other_args,
    )
}

/// [`ArgSpecChecker::check_plugin_argspec`] with the built-in validator
pub fn check_plugin_argspec(
    plugin_name: &str,
    args: &PluginArgs,
    schema: &Schema,
    conditionals: Option<&Conditionals>,
    other_args: Option<&PluginArgs>,
) -> (CheckResult, PluginArgs) {
    ArgSpecChecker::<ArgSpecValidator>::default().check_plugin_argspec(
        plugin_name,
        args,
        schema,
        conditionals,
        other_args,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{ArgumentSpec, OptionSpec, OptionType, RawValidation};
    use serde_json::json;

    struct StubValidator(RawValidation);

    impl SchemaValidator for StubValidator {
        fn validate(&self, _request: ValidationRequest<'_>) -> RawValidation {
            self.0.clone()
        }
    }

    fn schema() -> Schema {
        Schema::ArgSpec(ArgumentSpec::new().option("name", OptionSpec::new(OptionType::Str)))
    }

    #[test]
    fn test_single_string_error_is_wrapped() {
        let checker = ArgSpecChecker::new(StubValidator(RawValidation {
            valid: false,
            errors: RawErrors::One("boom".to_string()),
            updated: Value::Null,
        }));
        let outcome = checker.check_argspec("stub", &PluginArgs::new(), &schema(), None, None);
        assert!(!outcome.valid);
        assert_eq!(outcome.errors, vec!["boom"]);
        assert!(outcome.normalized.is_empty());
    }

    #[test]
    fn test_valid_forces_empty_errors() {
        let checker = ArgSpecChecker::new(StubValidator(RawValidation {
            valid: true,
            errors: RawErrors::One("ignored".to_string()),
            updated: json!({"name": "x"}),
        }));
        let outcome = checker.check_argspec("stub", &PluginArgs::new(), &schema(), None, None);
        assert!(outcome.valid);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.normalized["name"], json!("x"));
    }

    #[test]
    fn test_invalid_without_errors_still_reports_one() {
        let checker = ArgSpecChecker::new(StubValidator(RawValidation {
            valid: false,
            errors: RawErrors::None,
            updated: json!("not a mapping"),
        }));
        let (result, normalized) =
            checker.check_plugin_argspec("stub", &PluginArgs::new(), &schema(), None, None);
        assert!(result.failed);
        assert_eq!(result.errors, vec![UNKNOWN_VALIDATION_ERROR]);
        assert!(normalized.is_empty());
    }

    #[test]
    fn test_check_plugin_argspec_message() {
        let mut args = PluginArgs::new();
        args.insert("bogus".to_string(), json!(1));
        let (result, _) = check_plugin_argspec("copy", &args, &schema(), None, None);
        assert!(result.failed);
        assert_eq!(
            result.msg.as_deref(),
            Some("Errors during argspec validation for copy plugin")
        );
        assert_eq!(
            result.errors,
            vec!["Unsupported parameters: bogus. Supported parameters include: name."]
        );
    }

    #[test]
    fn test_rewrite_leaves_other_errors_alone() {
        let errors = vec![
            "foo, bar. Supported parameters include: a, b.".to_string(),
            "missing required arguments: name".to_string(),
            "a, b, c. Supported parameters include: x.".to_string(),
        ];
        assert_eq!(
            rewrite_unsupported_parameters(errors),
            vec![
                "Unsupported parameters: foo, bar. Supported parameters include: a, b.",
                "missing required arguments: name",
                "a, b, c. Supported parameters include: x.",
            ]
        );
    }
}
