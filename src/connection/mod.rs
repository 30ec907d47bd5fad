//! Connection layer consumed by action plugins.
//!
//! This module provides the narrow interface the action contract needs from a
//! transport: run a shell command, read a remote file and quote paths for the
//! remote shell. The transport itself belongs to the host engine; the crate
//! only ships a [`LocalConnection`] that runs everything on the control node.
//!
//! # Example
//!
//! ```rust,ignore
//! use plugin_base::connection::{Connection, LocalConnection};
//!
//! let conn = LocalConnection::new();
//! let result = conn.execute("uname -a", None).await?;
//! println!("Output: {}", result.stdout);
//!
//! let quoted = conn.shell().quote("/tmp/file with spaces");
//! ```

/// Local execution connection implementation.
pub mod local;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub use local::LocalConnection;

/// Errors that can occur during connection operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Command execution failed (not to be confused with non-zero exit code).
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// File upload or download operation failed.
    #[error("File transfer failed: {0}")]
    TransferFailed(String),

    /// Connection or operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// The result of executing a command on a connection.
///
/// # Example
///
/// ```rust
/// use plugin_base::connection::CommandResult;
///
/// let result = CommandResult::success("Hello".into(), String::new());
/// assert!(result.success);
/// assert_eq!(result.exit_code, 0);
///
/// let failed = CommandResult::failure(1, String::new(), "error".into());
/// assert!(!failed.success);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code of the command (0 typically indicates success).
    pub exit_code: i32,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
    /// Convenience flag: `true` if `exit_code == 0`.
    pub success: bool,
}

impl CommandResult {
    /// Create a new successful command result
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr,
            success: true,
        }
    }

    /// Create a new failed command result
    pub fn failure(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: false,
        }
    }

    /// Render as the `{rc, stdout, stderr}` mapping host engines expect.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rc": self.exit_code,
            "stdout": self.stdout,
            "stderr": self.stderr,
        })
    }
}

/// Options for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Working directory for the command
    pub cwd: Option<String>,
    /// Environment variables to set
    pub env: HashMap<String, String>,
    /// Timeout in seconds (None for no timeout)
    pub timeout: Option<u64>,
}

impl ExecuteOptions {
    /// Create new execute options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// POSIX shell helpers bound to one connection.
///
/// Holds the remote temporary directory once it has been created, so that
/// every temp path generated during the connection lifetime shares it.
#[derive(Debug, Default)]
pub struct Shell {
    tmpdir: RwLock<Option<String>>,
}

impl Shell {
    /// Create a shell with no temporary directory yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote a string so the remote shell reads it as a single word
    pub fn quote(&self, value: &str) -> String {
        shell_words::quote(value).into_owned()
    }

    /// Quote a path while keeping a leading `~` expandable by the shell
    pub fn quote_user_path(&self, path: &str) -> String {
        if path == "~" {
            return "~".to_string();
        }
        match path.strip_prefix("~/") {
            Some(rest) if !rest.is_empty() => format!("~/{}", self.quote(rest)),
            Some(_) => "~/".to_string(),
            None => self.quote(path),
        }
    }

    /// Join a remote directory and a file name
    pub fn join_path(&self, dir: &str, file: &str) -> String {
        if dir.ends_with('/') {
            format!("{}{}", dir, file)
        } else {
            format!("{}/{}", dir, file)
        }
    }

    /// Command that creates `<base>/<name>` with private permissions and
    /// prints its expanded path
    pub fn mkdtemp_command(&self, base: &str, name: &str) -> String {
        let base = self.quote_user_path(base);
        let name = self.quote(name);
        format!(
            "( umask 77 && mkdir -p {base} && mkdir {base}/{name} && echo {base}/{name} )",
            base = base,
            name = name
        )
    }

    /// The temporary directory created for this connection, if any
    pub fn tmpdir(&self) -> Option<String> {
        self.tmpdir.read().clone()
    }

    /// Remember the temporary directory created for this connection
    pub fn set_tmpdir(&self, dir: impl Into<String>) {
        *self.tmpdir.write() = Some(dir.into());
    }

    /// Forget the temporary directory, returning it
    pub fn clear_tmpdir(&self) -> Option<String> {
        self.tmpdir.write().take()
    }
}

/// The connection trait consumed by action plugins
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection identifier (hostname or container name)
    fn identifier(&self) -> &str;

    /// Shell helpers and per-connection shell state
    fn shell(&self) -> &Shell;

    /// Execute a command on the remote host
    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult>;

    /// Download a file content from the remote host
    async fn download_content(&self, remote_path: &Path) -> ConnectionResult<Vec<u8>>;

    /// Check if a path exists on the remote host
    async fn path_exists(&self, path: &Path) -> ConnectionResult<bool>;
}
