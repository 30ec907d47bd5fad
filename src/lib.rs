//! # plugin-base - base contracts for automation plugins
//!
//! plugin-base supplies the base layer of two plugin kinds of a
//! configuration-management engine: **action** plugins, which run logic
//! against a managed node, and **lookup** plugins, which resolve data at
//! template-render time. A plugin author implements one business method;
//! the crate validates and coerces the declared inputs, invokes the plugin
//! and merges partial and nested module results into one outcome.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     PluginRegistry                           │
//! │      (actions, lookups, modules; named not-found errors)     │
//! └──────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │          ActionBase          │  │          LookupBase          │
//! │  validate args → run plugin  │  │  validate vars → run plugin  │
//! │  → ExecutionResult merging   │  │  → Unsafe<Vec<Value>>        │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!        │          │                         │
//!        ▼          ▼                         ▼
//! ┌────────────┐ ┌──────────────────┐ ┌──────────────────────────┐
//! │ Connection │ │  ArgSpecChecker  │ │  Collection paths        │
//! │  + Shell   │ │  + validator     │ │  (config lookup)         │
//! └────────────┘ └──────────────────┘ └──────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use plugin_base::prelude::*;
//!
//! struct Greet;
//!
//! #[async_trait]
//! impl ActionPlugin for Greet {
//!     async fn run(&self, ctx: &ActionContext, _vars: &TaskVars, mut result: ExecutionResult)
//!         -> Result<ExecutionResult>
//!     {
//!         result.insert("greeting", format!("hello {}", ctx.args()["name"]));
//!         Ok(result)
//!     }
//! }
//!
//! let config = Arc::new(Config::load(None)?);
//! let mut registry = PluginRegistry::with_builtins(config.clone());
//! registry.register_action(
//!     "my.ns.greet",
//!     ActionSpec::new().with_argument_spec(
//!         ArgumentSpec::new().option("name", OptionSpec::new(OptionType::Str).required()),
//!     ),
//!     || Greet,
//! );
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports for plugin authors.

    pub use crate::action::{ActionBase, ActionContext, ActionPlugin, ActionSpec};
    pub use crate::config::Config;
    pub use crate::connection::{CommandResult, Connection, LocalConnection, Shell};
    pub use crate::error::{Error, Result};
    pub use crate::lookup::{LookupBase, LookupContext, LookupPlugin, LookupSpec, Unsafe};
    pub use crate::plugins::PluginRegistry;
    pub use crate::result::ExecutionResult;
    pub use crate::task::{PluginArgs, Task, TaskVars};
    pub use crate::validation::{
        ArgumentSpec, Conditionals, OptionSpec, OptionType, RequiredIf, Schema,
    };
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// Configuration loading and merging.
pub mod config;

/// Engine version parsing.
pub mod version;

/// Tasks and argument mappings.
pub mod task;

// ============================================================================
// Validation and Results
// ============================================================================

/// Argument specifications, the built-in validator and the checker contract.
pub mod validation;

/// Execution result mapping and merge rules.
pub mod result;

// ============================================================================
// Plugin Contracts
// ============================================================================

/// Action plugin contract, temp files and remote mirroring.
pub mod action;

/// Lookup plugin contract and the built-in `config` lookup.
pub mod lookup;

/// Plugin registry and dispatch.
pub mod plugins;

/// Collection path resolution and needle lookup.
pub mod path;

// ============================================================================
// Transport
// ============================================================================

/// Connection trait, shell helpers and the local transport.
pub mod connection;

/// Modules executed through a connection.
pub mod modules;

/// Returns the current version of plugin-base.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
