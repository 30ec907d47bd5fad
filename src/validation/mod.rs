//! Argument specification types and validation.
//!
//! A plugin declares its inputs either as a YAML documentation block with an
//! `options:` section or as a plain [`ArgumentSpec`]. The
//! [`checker`] turns the raw outcome of a [`SchemaValidator`] into a stable
//! contract; [`ArgSpecValidator`] is the validator shipped with the crate.

pub mod checker;
pub mod validator;

pub use checker::{
    check_argspec, check_plugin_argspec, rewrite_unsupported_parameters, ArgSpecChecker,
    CheckResult, ValidationOutcome,
};
pub use validator::{
    ArgSpecValidator, RawErrors, RawValidation, SchemaValidator, ValidationRequest,
};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Type of a declared option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    #[serde(alias = "string")]
    Str,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "integer")]
    Int,
    Float,
    List,
    Dict,
    Path,
    Raw,
    #[serde(alias = "jsonarg")]
    Json,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::Str => "str",
            OptionType::Bool => "bool",
            OptionType::Int => "int",
            OptionType::Float => "float",
            OptionType::List => "list",
            OptionType::Dict => "dict",
            OptionType::Path => "path",
            OptionType::Raw => "raw",
            OptionType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// Declaration of a single option
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionSpec {
    #[serde(rename = "type")]
    pub option_type: OptionType,

    #[serde(deserialize_with = "deserialize_flexible_bool")]
    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements: Option<OptionType>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl OptionSpec {
    pub fn new(option_type: OptionType) -> Self {
        Self {
            option_type,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_elements(mut self, elements: OptionType) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

/// Ordered mapping of option name to declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentSpec(IndexMap<String, OptionSpec>);

impl ArgumentSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option, builder style
    pub fn option(mut self, name: impl Into<String>, spec: OptionSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.0.get(name)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, OptionSpec> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, OptionSpec)> for ArgumentSpec {
    fn from_iter<T: IntoIterator<Item = (String, OptionSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `required_if` rule: when `key` equals `value`, `requirements` must be
/// present (all of them, or any one when `is_one_of` is set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RequiredIfRepr", into = "RequiredIfRepr")]
pub struct RequiredIf {
    pub key: String,
    pub value: Value,
    pub requirements: Vec<String>,
    pub is_one_of: bool,
}

impl RequiredIf {
    pub fn new<I, S>(key: impl Into<String>, value: impl Into<Value>, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            value: value.into(),
            requirements: requirements.into_iter().map(Into::into).collect(),
            is_one_of: false,
        }
    }

    pub fn one_of(mut self) -> Self {
        self.is_one_of = true;
        self
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RequiredIfRepr {
    Four(String, Value, Vec<String>, bool),
    Three(String, Value, Vec<String>),
}

impl From<RequiredIfRepr> for RequiredIf {
    fn from(repr: RequiredIfRepr) -> Self {
        match repr {
            RequiredIfRepr::Four(key, value, requirements, is_one_of) => Self {
                key,
                value,
                requirements,
                is_one_of,
            },
            RequiredIfRepr::Three(key, value, requirements) => Self {
                key,
                value,
                requirements,
                is_one_of: false,
            },
        }
    }
}

impl From<RequiredIf> for RequiredIfRepr {
    fn from(rule: RequiredIf) -> Self {
        if rule.is_one_of {
            RequiredIfRepr::Four(rule.key, rule.value, rule.requirements, true)
        } else {
            RequiredIfRepr::Three(rule.key, rule.value, rule.requirements)
        }
    }
}

/// Cross-parameter constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditionals {
    #[serde(
        deserialize_with = "deserialize_groups",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub mutually_exclusive: Vec<Vec<String>>,

    #[serde(
        deserialize_with = "deserialize_groups",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_together: Vec<Vec<String>>,

    #[serde(
        deserialize_with = "deserialize_groups",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_one_of: Vec<Vec<String>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_if: Vec<RequiredIf>,

    #[serde(
        deserialize_with = "deserialize_required_by",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub required_by: IndexMap<String, Vec<String>>,
}

impl Conditionals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mutually_exclusive<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutually_exclusive
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_together<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_together
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_one_of<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_one_of
            .push(group.into_iter().map(Into::into).collect());
        self
    }

    pub fn required_if(mut self, rule: RequiredIf) -> Self {
        self.required_if.push(rule);
        self
    }

    pub fn required_by<I, S>(mut self, key: impl Into<String>, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_by.insert(
            key.into(),
            requirements.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutually_exclusive.is_empty()
            && self.required_together.is_empty()
            && self.required_one_of.is_empty()
            && self.required_if.is_empty()
            && self.required_by.is_empty()
    }
}

/// Format tag of a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaFormat {
    #[default]
    Doc,
    ArgSpec,
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaFormat::Doc => write!(f, "doc"),
            SchemaFormat::ArgSpec => write!(f, "argspec"),
        }
    }
}

impl FromStr for SchemaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doc" => Ok(SchemaFormat::Doc),
            "argspec" => Ok(SchemaFormat::ArgSpec),
            other => Err(format!("unknown schema format '{}'", other)),
        }
    }
}

/// Declared inputs of a plugin
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// YAML documentation block with an `options:` section
    Doc(String),
    /// Plain argument specification
    ArgSpec(ArgumentSpec),
}

impl Schema {
    pub fn format(&self) -> SchemaFormat {
        match self {
            Schema::Doc(_) => SchemaFormat::Doc,
            Schema::ArgSpec(_) => SchemaFormat::ArgSpec,
        }
    }
}

impl From<ArgumentSpec> for Schema {
    fn from(spec: ArgumentSpec) -> Self {
        Schema::ArgSpec(spec)
    }
}

/// Accepts `true`/`false` plus the YAML 1.1 spellings used in documentation
/// blocks (`yes`, `no`, `on`, `off`).
pub(crate) fn deserialize_flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Text(String),
        Null(()),
    }

    match Flexible::deserialize(deserializer)? {
        Flexible::Bool(b) => Ok(b),
        Flexible::Null(()) => Ok(false),
        Flexible::Text(s) => match s.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "on" | "1" => Ok(true),
            "no" | "n" | "false" | "off" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "'{}' is not a valid boolean",
                other
            ))),
        },
    }
}

/// Accepts a single flat group or a list of groups
fn deserialize_groups<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Groups {
        Nested(Vec<Vec<String>>),
        Flat(Vec<String>),
    }

    Ok(match Groups::deserialize(deserializer)? {
        Groups::Nested(groups) => groups,
        Groups::Flat(group) if group.is_empty() => Vec::new(),
        Groups::Flat(group) => vec![group],
    })
}

fn deserialize_required_by<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let raw = IndexMap::<String, OneOrMany>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| match value {
            OneOrMany::One(req) => (key, vec![req]),
            OneOrMany::Many(reqs) => (key, reqs),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_spec_from_doc_yaml() {
        let yaml = r#"
type: list
elements: str
required: yes
aliases: [dest]
"#;
        let spec: OptionSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.option_type, OptionType::List);
        assert_eq!(spec.elements, Some(OptionType::Str));
        assert!(spec.required);
        assert_eq!(spec.aliases, vec!["dest"]);
    }

    #[test]
    fn test_option_type_aliases() {
        let spec: OptionSpec = serde_json::from_value(json!({"type": "boolean"})).unwrap();
        assert_eq!(spec.option_type, OptionType::Bool);
        let spec: OptionSpec = serde_json::from_value(json!({"type": "jsonarg"})).unwrap();
        assert_eq!(spec.option_type, OptionType::Json);
        let spec: OptionSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec.option_type, OptionType::Str);
    }

    #[test]
    fn test_conditionals_flat_and_nested_groups() {
        let conditionals: Conditionals = serde_json::from_value(json!({
            "mutually_exclusive": ["a", "b"],
            "required_one_of": [["a", "c"], ["d", "e"]],
            "required_if": [["state", "present", ["path"]], ["mode", 1, ["x", "y"], true]],
            "required_by": {"owner": "group", "src": ["dest", "mode"]},
        }))
        .unwrap();

        assert_eq!(conditionals.mutually_exclusive, vec![vec!["a", "b"]]);
        assert_eq!(conditionals.required_one_of.len(), 2);
        assert_eq!(
            conditionals.required_if[0],
            RequiredIf::new("state", "present", ["path"])
        );
        assert!(conditionals.required_if[1].is_one_of);
        assert_eq!(conditionals.required_by["owner"], vec!["group"]);
        assert_eq!(conditionals.required_by["src"], vec!["dest", "mode"]);
    }

    #[test]
    fn test_required_if_serializes_as_tuple() {
        let rule = RequiredIf::new("state", "absent", ["path"]);
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!(["state", "absent", ["path"]])
        );
        let rule = rule.one_of();
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!(["state", "absent", ["path"], true])
        );
    }

    #[test]
    fn test_schema_format() {
        assert_eq!(Schema::Doc(String::new()).format().to_string(), "doc");
        assert_eq!(
            Schema::from(ArgumentSpec::new()).format(),
            SchemaFormat::ArgSpec
        );
        assert_eq!("argspec".parse::<SchemaFormat>(), Ok(SchemaFormat::ArgSpec));
        assert!("xml".parse::<SchemaFormat>().is_err());
    }
}
