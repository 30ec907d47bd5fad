//! The outcome mapping of one plugin invocation.
//!
//! An [`ExecutionResult`] starts from the `changed`/`skipped`/`failed`
//! baseline and accumulates plugin keys, checker output and nested module
//! results. Merging a module result follows fixed per-key rules; see
//! [`ExecutionResult::merge_module_result`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::validation::CheckResult;

/// Keys of a module result that are lifted to the top level when merged
pub const SPECIAL_KEYS: &[&str] = &[
    "diff",
    "changed",
    "failed",
    "facts",
    "error",
    "errors",
    "exception",
    "invocation",
];

/// Keys whose values accumulate instead of being overwritten
const CONCAT_KEYS: &[&str] = &["error", "errors", "exception"];

/// Recursively merge `overlay` into `base`; mappings merge key by key,
/// anything else is replaced by the overlay.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Concatenate two accumulating values.
///
/// Lists append, strings concatenate, and mixed kinds are flattened into a
/// single list.
pub fn concat_values(existing: Value, new: Value) -> Value {
    match (existing, new) {
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (Value::String(a), Value::String(b)) => Value::String(a + &b),
        (a, b) => {
            let mut items = match a {
                Value::Array(items) => items,
                other => vec![other],
            };
            match b {
                Value::Array(more) => items.extend(more),
                other => items.push(other),
            }
            Value::Array(items)
        }
    }
}

/// Insertion-ordered result mapping of a single invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionResult(IndexMap<String, Value>);

impl ExecutionResult {
    /// An empty result, without the baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// A result initialized with the baseline
    pub fn baseline() -> Self {
        let mut result = Self::new();
        result.set_baseline();
        result
    }

    /// Set `changed`, `skipped` and `failed` to false
    pub fn set_baseline(&mut self) {
        for key in ["changed", "skipped", "failed"] {
            self.0.insert(key.to_string(), Value::Bool(false));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn is_failed(&self) -> bool {
        self.flag("failed")
    }

    pub fn is_changed(&self) -> bool {
        self.flag("changed")
    }

    pub fn is_skipped(&self) -> bool {
        self.flag("skipped")
    }

    /// Merge checker output: `errors`, `failed` and, when set, `msg`
    pub fn merge_check_result(&mut self, check: &CheckResult) {
        self.insert("errors", check.errors.clone());
        self.insert("failed", check.failed);
        if let Some(msg) = &check.msg {
            self.insert("msg", msg.clone());
        }
    }

    /// Mark the result failed with the given errors and message
    pub fn mark_failed(&mut self, errors: Vec<String>, msg: impl Into<String>) {
        self.insert("failed", true);
        self.insert("errors", errors);
        self.insert("msg", msg.into());
    }

    /// Merge a raw module result.
    ///
    /// The result minus its non-null special keys is nested under `key`;
    /// null special values stay in the nested copy. Each lifted value is
    /// merged at the top level: an existing mapping deep-merges with a new
    /// mapping and is replaced by anything else, an existing
    /// `error`/`errors`/`exception` accumulates the new value, anything else
    /// overwrites.
    pub fn merge_module_result(&mut self, key: &str, mut raw: IndexMap<String, Value>) {
        let mut lifted = Vec::new();
        for special in SPECIAL_KEYS {
            if raw.get(*special).is_some_and(|v| !v.is_null()) {
                if let Some(value) = raw.shift_remove(*special) {
                    lifted.push((*special, value));
                }
            }
        }

        self.0
            .insert(key.to_string(), Value::Object(raw.into_iter().collect()));

        for (special, value) in lifted {
            trace!(key = %special, "Merging module result key");
            match self.0.get_mut(special) {
                Some(existing) if existing.is_object() => {
                    if value.is_object() {
                        deep_merge(existing, value);
                    } else {
                        *existing = value;
                    }
                }
                Some(existing) if CONCAT_KEYS.contains(&special) => {
                    let previous = std::mem::take(existing);
                    *existing = concat_values(previous, value);
                }
                _ => {
                    self.0.insert(special.to_string(), value);
                }
            }
        }
    }

    /// Borrow the underlying mapping
    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }

    /// Render as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl From<IndexMap<String, Value>> for ExecutionResult {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl std::ops::Index<&str> for ExecutionResult {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(key).unwrap_or(&NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_baseline() {
        let result = ExecutionResult::baseline();
        assert_eq!(
            result.to_value(),
            json!({"changed": false, "skipped": false, "failed": false})
        );
        let keys: Vec<_> = result.keys().collect();
        assert_eq!(keys, vec!["changed", "skipped", "failed"]);
    }

    #[test]
    fn test_merge_nests_result_without_special_keys() {
        let mut result = ExecutionResult::baseline();
        result.merge_module_result(
            "my_module",
            raw(json!({"changed": true, "stdout": "ok", "invocation": {"module_args": {}}})),
        );

        assert_eq!(result["my_module"], json!({"stdout": "ok"}));
        assert_eq!(result["changed"], json!(true));
        assert_eq!(result["invocation"], json!({"module_args": {}}));
    }

    #[test]
    fn test_merge_deep_merges_mappings() {
        let mut result = ExecutionResult::baseline();
        result.insert("diff", json!({"before": {"a": 1, "b": 1}}));
        result.merge_module_result(
            "m",
            raw(json!({"diff": {"before": {"b": 2}, "after": "x"}})),
        );
        assert_eq!(
            result["diff"],
            json!({"before": {"a": 1, "b": 2}, "after": "x"})
        );
    }

    #[test]
    fn test_merge_concatenates_errors() {
        let mut result = ExecutionResult::baseline();
        result.insert("errors", json!(["first"]));
        result.insert("exception", json!("trace 1\n"));
        result.insert("error", json!("single"));
        result.merge_module_result(
            "m",
            raw(json!({"errors": ["second"], "exception": "trace 2\n", "error": ["listed"]})),
        );

        assert_eq!(result["errors"], json!(["first", "second"]));
        assert_eq!(result["exception"], json!("trace 1\ntrace 2\n"));
        assert_eq!(result["error"], json!(["single", "listed"]));
    }

    #[test]
    fn test_merge_overwrites_booleans() {
        let mut result = ExecutionResult::baseline();
        result.merge_module_result("first", raw(json!({"changed": true})));
        assert!(result.is_changed());
        result.merge_module_result("second", raw(json!({"changed": false})));
        assert!(!result.is_changed());
    }

    #[test]
    fn test_merge_keeps_null_special_values_nested() {
        let mut result = ExecutionResult::baseline();
        result.merge_module_result("m", raw(json!({"failed": null, "rc": 0})));
        assert_eq!(result["failed"], json!(false));
        assert_eq!(result["m"], json!({"failed": null, "rc": 0}));
    }

    #[test]
    fn test_merge_check_result_and_mark_failed() {
        let mut result = ExecutionResult::baseline();
        result.merge_check_result(&CheckResult {
            errors: vec![],
            failed: false,
            msg: None,
        });
        assert_eq!(result["errors"], json!([]));
        assert!(!result.contains_key("msg"));

        result.mark_failed(vec!["bad".to_string()], "it broke");
        assert!(result.is_failed());
        assert_eq!(result["msg"], json!("it broke"));
    }

    #[test]
    fn test_concat_values_mixed_kinds() {
        assert_eq!(concat_values(json!("a"), json!(["b"])), json!(["a", "b"]));
        assert_eq!(concat_values(json!(1), json!(2)), json!([1, 2]));
    }
}
