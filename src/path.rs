//! Collection path resolution and needle lookup.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Error, PluginKind, Result};
use crate::lookup::config::COLLECTIONS_PATHS;
use crate::plugins::PluginRegistry;
use crate::task::PluginArgs;

/// Candidate directories of a collection, one per configured root.
///
/// The roots come from the registered `config` lookup; the dotted
/// collection name is appended as path segments
/// (`my.coll` under `/root` gives `/root/my/coll`).
pub fn get_collection_path(registry: &Arc<PluginRegistry>, full_name: &str) -> Result<Vec<PathBuf>> {
    let values = registry
        .run_lookup("config", &[Value::from(COLLECTIONS_PATHS)], None, &PluginArgs::new())
        .map_err(|e| match e {
            Error::PluginNotFound {
                kind: PluginKind::Lookup,
                ..
            } => Error::Config("Unable to load config lookup".to_string()),
            other => other,
        })?;

    let roots = match values.into_iter().next() {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    };

    let paths: Vec<PathBuf> = roots
        .iter()
        .filter_map(|root| match root {
            Value::String(s) => Some(PathBuf::from(s)),
            _ => None,
        })
        .map(|root| full_name.split('.').fold(root, |path, segment| path.join(segment)))
        .collect();

    trace!(collection = %full_name, paths = ?paths, "Resolved collection paths");
    Ok(paths)
}

/// Find `needle` in the directories of `full_name` and the task search path.
///
/// The collection directories are searched first when `collection_first` is
/// set, after the task search path otherwise. In each directory
/// `<dir>/<dirname>/<needle>` is tried before `<dir>/<needle>`.
pub fn find_needle_in_collection(
    registry: &Arc<PluginRegistry>,
    task_search_path: &[PathBuf],
    full_name: &str,
    dirname: &str,
    needle: &str,
    collection_first: bool,
) -> Result<PathBuf> {
    let collection_paths = get_collection_path(registry, full_name)?;

    let path_stack: Vec<PathBuf> = if collection_first {
        collection_paths
            .into_iter()
            .chain(task_search_path.iter().cloned())
            .collect()
    } else {
        task_search_path
            .iter()
            .cloned()
            .chain(collection_paths)
            .collect()
    };

    debug!(
        needle = %needle,
        dirname = %dirname,
        stack = ?path_stack,
        "Searching needle"
    );
    find_in_path_stack(&path_stack, dirname, needle)
}

/// Search `dirname/needle` then `needle` in every directory of the stack
pub fn find_in_path_stack(path_stack: &[PathBuf], dirname: &str, needle: &str) -> Result<PathBuf> {
    let needle_path = Path::new(needle);
    if needle_path.is_absolute() {
        if needle_path.exists() {
            return Ok(needle_path.to_path_buf());
        }
        return Err(Error::NeedleNotFound {
            needle: needle.to_string(),
            searched: vec![needle_path.to_path_buf()],
        });
    }

    let mut searched = Vec::with_capacity(path_stack.len() * 2);
    for dir in path_stack {
        let nested = dir.join(dirname).join(needle);
        if nested.exists() {
            return Ok(nested);
        }
        let direct = dir.join(needle);
        if direct.exists() {
            return Ok(direct);
        }
        searched.push(dir.join(dirname));
        searched.push(dir.clone());
    }

    Err(Error::NeedleNotFound {
        needle: needle.to_string(),
        searched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn registry(roots: &[&str]) -> Arc<PluginRegistry> {
        let config = Config {
            collections_paths: roots.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        };
        Arc::new(PluginRegistry::with_builtins(Arc::new(config)))
    }

    #[test]
    fn test_get_collection_path() {
        let paths = get_collection_path(&registry(&["/a", "/b"]), "yoanm.utils").unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("/a/yoanm/utils"), PathBuf::from("/b/yoanm/utils")]
        );
    }

    #[test]
    fn test_get_collection_path_without_config_lookup() {
        let err = get_collection_path(&Arc::new(PluginRegistry::new()), "a.b").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_find_in_path_stack_prefers_dirname() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/x.j2"), "nested").unwrap();
        std::fs::write(dir.path().join("x.j2"), "direct").unwrap();

        let found = find_in_path_stack(&[dir.path().to_path_buf()], "templates", "x.j2").unwrap();
        assert_eq!(found, dir.path().join("templates/x.j2"));

        let found = find_in_path_stack(&[dir.path().to_path_buf()], "files", "x.j2").unwrap();
        assert_eq!(found, dir.path().join("x.j2"));
    }

    #[test]
    fn test_find_in_path_stack_not_found() {
        let err = find_in_path_stack(&[PathBuf::from("/nowhere")], "files", "f").unwrap_err();
        match err {
            Error::NeedleNotFound { needle, searched } => {
                assert_eq!(needle, "f");
                assert_eq!(
                    searched,
                    vec![PathBuf::from("/nowhere/files"), PathBuf::from("/nowhere")]
                );
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
