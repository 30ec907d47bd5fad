//! Slurp module - read a file from the managed node as base64

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use std::path::Path;
use tracing::debug;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult};

/// Reads a remote file and returns `{content, encoding: "base64", source}`.
///
/// Unreadable files are reported as `{failed: true, msg}` rather than as an
/// error so callers can inspect the outcome like any other module result.
pub struct SlurpModule;

impl SlurpModule {
    fn source(params: &ModuleParams) -> ModuleResult<&str> {
        params
            .get("path")
            .or_else(|| params.get("src"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ModuleError::InvalidParameter("path must be a string".to_string()))
    }

    fn failed(msg: String) -> ModuleOutput {
        let mut output = ModuleOutput::new();
        output.insert("failed".to_string(), json!(true));
        output.insert("msg".to_string(), json!(msg));
        output
    }
}

#[async_trait]
impl Module for SlurpModule {
    fn name(&self) -> &'static str {
        "slurp"
    }

    fn description(&self) -> &'static str {
        "Slurps a file from remote nodes"
    }

    fn required_params(&self) -> &[&'static str] {
        &["path"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        if params.get("path").or_else(|| params.get("src")).map_or(true, |v| v.is_null()) {
            return Err(ModuleError::MissingParameter("path".to_string()));
        }
        Ok(())
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let source = Self::source(params)?;
        let path = Path::new(source);
        debug!(source = %source, host = %context.connection.identifier(), "Slurping file");

        if !context.connection.path_exists(path).await? {
            return Ok(Self::failed(format!("file not found: {}", source)));
        }

        match context.connection.download_content(path).await {
            Ok(bytes) => {
                let mut output = ModuleOutput::new();
                output.insert("changed".to_string(), json!(false));
                output.insert("content".to_string(), json!(STANDARD.encode(bytes)));
                output.insert("encoding".to_string(), json!("base64"));
                output.insert("source".to_string(), json!(source));
                Ok(output)
            }
            Err(e) => Ok(Self::failed(format!("file is not readable: {}: {}", source, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::LocalConnection;
    use std::sync::Arc;

    fn context() -> ModuleContext {
        ModuleContext::new(Arc::new(LocalConnection::with_identifier("test")))
    }

    #[tokio::test]
    async fn test_slurp_reads_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motd");
        std::fs::write(&path, "hello\n").unwrap();

        let mut params = ModuleParams::new();
        params.insert("path".to_string(), json!(path.to_str().unwrap()));

        let output = SlurpModule.execute(&params, &context()).await.unwrap();
        assert_eq!(output["content"], json!("aGVsbG8K"));
        assert_eq!(output["encoding"], json!("base64"));
        assert_eq!(output["source"], json!(path.to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_slurp_missing_file_is_failed_result() {
        let mut params = ModuleParams::new();
        params.insert("src".to_string(), json!("/definitely/not/here"));

        let output = SlurpModule.execute(&params, &context()).await.unwrap();
        assert_eq!(output["failed"], json!(true));
        assert_eq!(output["msg"], json!("file not found: /definitely/not/here"));
    }

    #[test]
    fn test_slurp_accepts_src_alias() {
        let mut params = ModuleParams::new();
        assert!(SlurpModule.validate_params(&params).is_err());
        params.insert("src".to_string(), json!("/etc/hostname"));
        assert!(SlurpModule.validate_params(&params).is_ok());
    }
}
