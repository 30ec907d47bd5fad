//! Collection commands: `collection-path` and `find`

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use plugin_base::error::Error;
use plugin_base::path;
use serde_json::json;
use std::path::PathBuf;

/// Arguments for the collection-path command
#[derive(Parser, Debug, Clone)]
pub struct CollectionPathArgs {
    /// Dotted collection name, e.g. `my_ns.my_coll`
    pub name: String,
}

impl CollectionPathArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let paths = match path::get_collection_path(&ctx.registry, &self.name) {
            Ok(paths) => paths,
            Err(e) => return Ok(report(ctx, &e)),
        };

        let items: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        if ctx.output.is_json() {
            ctx.output
                .document(&json!({ "collection": self.name, "paths": items }));
        } else {
            ctx.output.list(&self.name, &items);
        }
        Ok(0)
    }
}

/// Arguments for the find command
#[derive(Parser, Debug, Clone)]
pub struct FindArgs {
    /// Dotted collection name
    pub collection: String,

    /// Sub-directory tried first in every searched directory
    pub dirname: String,

    /// File to find
    pub needle: String,

    /// Task search path entries (searched before the collection by default)
    #[arg(long = "search-path", short = 'p', action = clap::ArgAction::Append)]
    pub search_path: Vec<PathBuf>,

    /// Search the collection before the task search path
    #[arg(long)]
    pub collection_first: bool,
}

impl FindArgs {
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let found = path::find_needle_in_collection(
            &ctx.registry,
            &self.search_path,
            &self.collection,
            &self.dirname,
            &self.needle,
            self.collection_first,
        );

        match found {
            Ok(found) => {
                if ctx.output.is_json() {
                    ctx.output.document(&json!({ "path": found.display().to_string() }));
                } else {
                    println!("{}", found.display());
                }
                Ok(0)
            }
            Err(e) => {
                if let Error::NeedleNotFound { searched, .. } = &e {
                    ctx.output.info(&format!("Searched {} location(s)", searched.len()));
                }
                Ok(report(ctx, &e))
            }
        }
    }
}

/// Print a library error and map it to its exit code
fn report(ctx: &CommandContext, error: &Error) -> i32 {
    ctx.output.error(&error.to_string());
    error.exit_code()
}
