//! Property-based tests for plugin-base using proptest.

mod common;

use common::{action_context, config_in};
use plugin_base::config::Config;
use plugin_base::plugins::PluginRegistry;
use plugin_base::task::{PluginArgs, Task};
use plugin_base::validation::{
    check_argspec, rewrite_unsupported_parameters, ArgumentSpec, OptionSpec, OptionType, Schema,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

fn schema() -> Schema {
    Schema::ArgSpec(
        ArgumentSpec::new()
            .option("name", OptionSpec::new(OptionType::Str).with_aliases(["n"]))
            .option("count", OptionSpec::new(OptionType::Int).with_default(1))
            .option("enabled", OptionSpec::new(OptionType::Bool))
            .option("tags", OptionSpec::new(OptionType::List).with_elements(OptionType::Str))
            .option(
                "state",
                OptionSpec::new(OptionType::Str).with_choices(["present", "absent"]),
            ),
    )
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z0-9]{0,8}".prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn arguments() -> impl Strategy<Value = PluginArgs> {
    let key = prop_oneof![
        Just("name"),
        Just("n"),
        Just("count"),
        Just("enabled"),
        Just("tags"),
        Just("state"),
    ];
    let value = prop_oneof![
        scalar(),
        prop::collection::vec("[a-z]{1,4}", 0..3).prop_map(|v| json!(v)),
        prop_oneof![Just("present"), Just("absent")].prop_map(Value::from),
    ];
    prop::collection::vec((key, value), 0..6)
        .prop_map(|pairs| pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Validating an already normalized mapping changes nothing
    #[test]
    fn normalization_is_idempotent(args in arguments()) {
        let schema = schema();
        let first = check_argspec("prop", &args, &schema, None, None);
        prop_assume!(first.valid);

        let second = check_argspec("prop", &first.normalized, &schema, None, None);
        prop_assert!(second.valid);
        prop_assert_eq!(second.normalized, first.normalized);
    }

    /// Errors are present exactly when validation fails
    #[test]
    fn errors_match_validity(args in arguments()) {
        let outcome = check_argspec("prop", &args, &schema(), None, None);
        prop_assert_eq!(outcome.valid, outcome.errors.is_empty());
        for name in ["name", "count", "enabled", "tags", "state"] {
            prop_assert!(outcome.normalized.contains_key(name) || !outcome.valid);
        }
    }

    /// Messages that are not unsupported-parameter errors are never rewritten
    #[test]
    fn rewrite_only_touches_unsupported_messages(msg in "[a-z ]{0,40}") {
        let rewritten = rewrite_unsupported_parameters(vec![msg.clone()]);
        prop_assert_eq!(rewritten, vec![msg]);
    }

    /// Temp file names are `<task name>-<u32>.tmp`
    #[test]
    fn tmp_filename_shape(name in "[a-zA-Z0-9_]{1,24}") {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let ctx = action_context(
            Task::new("my.ns.action").with_name(name.clone()),
            config.clone(),
            PluginRegistry::with_builtins(config),
        );

        let filename = ctx.generate_tmp_filename();
        let number = filename
            .strip_prefix(&format!("{}-", name))
            .and_then(|rest| rest.strip_suffix(".tmp"));
        prop_assert!(number.is_some());
        prop_assert!(number.unwrap().parse::<u32>().is_ok());
    }
}

#[test]
fn test_default_config_tmpdir_is_first_entry() {
    let config = Arc::new(Config {
        system_tmpdirs: vec!["/first".to_string(), "/second".to_string()],
        ..Config::default()
    });
    let ctx = action_context(
        Task::new("t"),
        config.clone(),
        PluginRegistry::with_builtins(config),
    );
    let path = ctx.generate_local_tmp_file_path().unwrap();
    assert!(path.starts_with("/first"));
}
