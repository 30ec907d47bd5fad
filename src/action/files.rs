//! Temporary files and remote mirroring for action plugins.
//!
//! Names are `<task name>-<random u32>.tmp`; uniqueness is probabilistic
//! and a local collision fails loudly instead of overwriting.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use super::ActionContext;
use crate::error::{Error, Result};
use crate::task::{PluginArgs, TaskVars};

/// Create `path` exclusively and write `content` into it.
///
/// An existing file is an error and keeps its content. A file created here
/// is removed again when writing fails.
pub fn write_new_tempfile(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            Error::action_fail(format!(
                "Unable to create temporary file {}: {}",
                path.display(),
                e
            ))
        })?;

    if let Err(e) = file.write_all(content).and_then(|_| file.flush()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(Error::action_fail(format!(
            "Unable to write temporary file {}: {}",
            path.display(),
            e
        )));
    }

    debug!(path = %path.display(), bytes = content.len(), "Created local temporary file");
    Ok(())
}

impl ActionContext {
    /// `<task name>-<random u32>.tmp`
    pub fn generate_tmp_filename(&self) -> String {
        format!("{}-{}.tmp", self.task().get_name(), rand::random::<u32>())
    }

    /// Generated file name under the first configured local temp directory
    pub fn generate_local_tmp_file_path(&self) -> Result<PathBuf> {
        let dir = self
            .config()
            .system_tmpdirs()
            .into_iter()
            .next()
            .ok_or_else(|| Error::action_fail("No local temporary directory configured"))?;
        Ok(dir.join(self.generate_tmp_filename()))
    }

    /// Create a new local temp file holding `content` and return its path.
    ///
    /// See [`write_new_tempfile`] for the collision and cleanup rules.
    pub fn create_local_tempfile(&self, content: &[u8]) -> Result<PathBuf> {
        let path = self.generate_local_tmp_file_path()?;
        write_new_tempfile(&path, content)?;
        Ok(path)
    }

    /// Read a remote file through the `slurp` module into a new local temp
    /// file and return the local path.
    pub async fn fetch_remote_file_to_local_tmp(
        &self,
        task_vars: Option<&TaskVars>,
        remote_source: &str,
    ) -> Result<PathBuf> {
        info!(source = %remote_source, "Fetching remote file to local temporary directory");

        let mut args = PluginArgs::new();
        args.insert("path".to_string(), json!(remote_source));
        let res = self.execute_module(Some("slurp"), Some(args), task_vars).await?;

        if res.get("failed").and_then(Value::as_bool).unwrap_or(false) {
            return Err(Error::action_fail(format!(
                "Error during remote file mirroring: {}",
                Value::Object(res.into_iter().collect())
            )));
        }

        let content = match res.get("content") {
            None => Vec::new(),
            Some(content) => {
                let encoding = res.get("encoding").and_then(Value::as_str).unwrap_or("");
                if encoding != "base64" {
                    return Err(Error::action_fail(format!(
                        "Error during remote file mirroring, unknown encoding: {}",
                        encoding
                    )));
                }
                let content = content.as_str().ok_or_else(|| {
                    Error::action_fail(format!(
                        "Error during remote file mirroring, content is not a string: {}",
                        content
                    ))
                })?;
                STANDARD
                    .decode(content)
                    .map_err(|e| {
                        Error::action_fail(format!(
                            "Error during remote file mirroring, invalid base64 content: {}",
                            e
                        ))
                    })?
            }
        };

        self.create_local_tempfile(&content)
    }

    /// Copy `source` to `dest` on the managed node, keeping attributes.
    ///
    /// Runs regardless of check mode; the caller owns `dest` afterwards.
    pub async fn mirror_remote_file(&self, source: &str, dest: &str) -> Result<()> {
        info!(source = %source, dest = %dest, "Mirroring remote file");

        let shell = self.connection().shell();
        let cmd = format!("cp -a {} {}", shell.quote(source), shell.quote(dest));
        let result = self.connection().execute(&cmd, None).await?;

        if result.exit_code != 0 {
            return Err(Error::action_fail(format!(
                "Error during remote file mirroring: {}",
                result.to_json()
            )));
        }
        Ok(())
    }

    /// Create the per-connection remote temp directory once and return it
    pub async fn ensure_remote_tmp_dir(&self) -> Result<String> {
        let shell = self.connection().shell();
        if let Some(dir) = shell.tmpdir() {
            return Ok(dir);
        }

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let name = format!(
            "plugin-base-tmp-{}-{}-{}",
            stamp,
            std::process::id(),
            rand::random::<u64>() % (1u64 << 48)
        );
        let cmd = shell.mkdtemp_command(&self.config().remote_tmp, &name);
        let result = self.connection().execute(&cmd, None).await?;

        let dir = result.stdout.trim().to_string();
        if result.exit_code != 0 || dir.is_empty() {
            return Err(Error::action_fail(format!(
                "Failed to create temporary directory: {}",
                result.to_json()
            )));
        }

        debug!(dir = %dir, "Created remote temporary directory");
        shell.set_tmpdir(dir.clone());
        Ok(dir)
    }

    /// Generated file name under `dir`
    pub fn compose_remote_tmp_file_path(&self, dir: &str) -> String {
        self.connection()
            .shell()
            .join_path(dir, &self.generate_tmp_filename())
    }

    /// [`ensure_remote_tmp_dir`](Self::ensure_remote_tmp_dir) followed by
    /// [`compose_remote_tmp_file_path`](Self::compose_remote_tmp_file_path)
    pub async fn generate_remote_tmp_file_path(&self) -> Result<String> {
        let dir = self.ensure_remote_tmp_dir().await?;
        Ok(self.compose_remote_tmp_file_path(&dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::LocalConnection;
    use crate::plugins::PluginRegistry;
    use crate::task::Task;
    use std::sync::Arc;

    fn context(tmp: &std::path::Path) -> ActionContext {
        let config = Arc::new(Config {
            system_tmpdirs: vec![tmp.display().to_string()],
            remote_tmp: tmp.join("remote").display().to_string(),
            ..Config::default()
        });
        ActionContext::new(
            Task::new("my.ns.files").with_name("files"),
            Arc::new(LocalConnection::with_identifier("test")),
            Arc::new(PluginRegistry::with_builtins(config.clone())),
            config,
        )
    }

    #[test]
    fn test_generate_tmp_filename_shape() {
        let dir = tempfile::tempdir().unwrap();
        let name = context(dir.path()).generate_tmp_filename();
        let number = name
            .strip_prefix("files-")
            .and_then(|rest| rest.strip_suffix(".tmp"))
            .unwrap();
        assert!(number.parse::<u32>().is_ok());
    }

    #[test]
    fn test_create_local_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = context(dir.path()).create_local_tempfile(b"payload").unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn test_local_tmp_path_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let ctx = ActionContext::new(
            ctx.task().clone(),
            ctx.connection().clone(),
            ctx.registry().clone(),
            Arc::new(Config {
                system_tmpdirs: vec![],
                ..Config::default()
            }),
        );
        assert!(matches!(
            ctx.generate_local_tmp_file_path(),
            Err(Error::ActionFail(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_tmp_dir_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let first = ctx.ensure_remote_tmp_dir().await.unwrap();
        assert!(std::path::Path::new(&first).is_dir());
        assert!(first.starts_with(&dir.path().join("remote").display().to_string()));

        let second = ctx.ensure_remote_tmp_dir().await.unwrap();
        assert_eq!(first, second);

        let file = ctx.generate_remote_tmp_file_path().await.unwrap();
        assert!(file.starts_with(&first));
        assert!(file.ends_with(".tmp"));
    }
}
