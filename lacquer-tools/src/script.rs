//! ABOUTME: Script-kind tool/step handler - spawns an interpreter with the stdin/stdout JSON contract
//! ABOUTME: Go sources are compiled once to a per-content-hash cached binary and reused thereafter

use crate::error::ToolError;
use crate::handler::{ToolCallContext, ToolHandler};
use async_trait::async_trait;
use lacquer_core::document::RuntimeKind;
use lacquer_core::types::ToolDescriptor;
use lacquer_utils::ScratchWorkspace;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Where a script's source body comes from: an inline string in the
/// document, or a `./path` reference resolved relative to the workflow
/// file's directory.
#[derive(Debug, Clone)]
pub enum ScriptBody {
    Inline(String),
    Path(PathBuf),
}

impl ScriptBody {
    /// Either `script:` or `run:` on a tool/step accept both inline and file
    /// references; resolve whichever form was declared.
    pub async fn resolve(&self) -> Result<String, ToolError> {
        match self {
            ScriptBody::Inline(body) => Ok(body.clone()),
            ScriptBody::Path(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(ToolError::Io),
        }
    }
}

fn extension_for(runtime: RuntimeKind) -> &'static str {
    match runtime {
        RuntimeKind::Bash => "sh",
        RuntimeKind::Node => "js",
        RuntimeKind::Python => "py",
        RuntimeKind::Go => "go",
    }
}

fn interpreter_for(runtime: RuntimeKind) -> Option<&'static str> {
    match runtime {
        RuntimeKind::Bash => Some("bash"),
        RuntimeKind::Node => Some("node"),
        RuntimeKind::Python => Some("python3"),
        RuntimeKind::Go => None, // compiled, invoked directly
    }
}

/// A single script-kind tool or step. Reused by both the tool registry and
/// the step executor (a step's `run:` and a tool's `script:` share this
/// exact contract).
pub struct ScriptHandler {
    descriptor: ToolDescriptor,
    runtime: RuntimeKind,
    body: ScriptBody,
    go_binary_cache: Arc<Mutex<std::collections::HashMap<String, PathBuf>>>,
}

impl ScriptHandler {
    #[must_use]
    pub fn new(descriptor: ToolDescriptor, runtime: RuntimeKind, body: ScriptBody) -> Self {
        Self {
            descriptor,
            runtime,
            body,
            go_binary_cache: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    async fn require_interpreter(&self, name: &str) -> Result<(), ToolError> {
        if which::which(name).is_err() {
            return Err(ToolError::MissingRuntime {
                tool: self.descriptor.name.clone(),
                runtime: name.to_string(),
            });
        }
        Ok(())
    }

    /// For Go sources: compile once per content hash, cache the resulting
    /// binary, and reuse it on subsequent invocations within the process.
    async fn go_binary(&self, source: &str, cache_dir: &std::path::Path) -> Result<PathBuf, ToolError> {
        let hash = format!("{:x}", Sha256::digest(source.as_bytes()));
        {
            let cache = self.go_binary_cache.lock().await;
            if let Some(path) = cache.get(&hash) {
                if path.exists() {
                    return Ok(path.clone());
                }
            }
        }

        self.require_interpreter("go").await?;
        tokio::fs::create_dir_all(cache_dir).await?;
        let src_path = cache_dir.join(format!("{hash}.go"));
        let bin_path = cache_dir.join(format!("{hash}.bin"));
        tokio::fs::write(&src_path, source).await?;

        let output = Command::new("go")
            .args(["build", "-o"])
            .arg(&bin_path)
            .arg(&src_path)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ToolError::ExecutionFailed {
                tool: self.descriptor.name.clone(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        self.go_binary_cache
            .lock()
            .await
            .insert(hash, bin_path.clone());
        Ok(bin_path)
    }

    async fn invoke(
        &self,
        envelope: JsonValue,
        ctx: &ToolCallContext,
    ) -> Result<JsonValue, ToolError> {
        let source = self.body.resolve().await?;
        let workspace = ScratchWorkspace::new(&ctx.step_id)?;

        let mut command = match self.runtime {
            RuntimeKind::Go => {
                let binary = self.go_binary(&source, workspace.path()).await?;
                Command::new(binary)
            }
            other => {
                let interpreter = interpreter_for(other).expect("non-go runtimes have an interpreter");
                self.require_interpreter(interpreter).await?;
                let script_path = workspace.join(&format!("script.{}", extension_for(other)));
                tokio::fs::write(&script_path, &source).await?;
                let mut cmd = Command::new(interpreter);
                cmd.arg(&script_path);
                cmd
            }
        };

        command
            .envs(&ctx.env)
            .env("LACQUER_WORKSPACE", workspace.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&envelope).map_err(|e| ToolError::MalformedOutput {
                tool: self.descriptor.name.clone(),
                message: e.to_string(),
            })?;
            stdin.write_all(&payload).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                tool: self.descriptor.name.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let stdout: JsonValue =
            serde_json::from_slice(&output.stdout).map_err(|e| ToolError::MalformedOutput {
                tool: self.descriptor.name.clone(),
                message: e.to_string(),
            })?;
        stdout
            .get("outputs")
            .cloned()
            .ok_or_else(|| ToolError::MalformedOutput {
                tool: self.descriptor.name.clone(),
                message: "stdout JSON missing an 'outputs' key".into(),
            })
    }
}

#[async_trait]
impl ToolHandler for ScriptHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, input: JsonValue, ctx: &ToolCallContext) -> Result<JsonValue, ToolError> {
        let envelope = serde_json::json!({
            "inputs": input,
            "env": ctx.env,
            "context": {
                "workflowId": ctx.workflow_id,
                "stepId": ctx.step_id,
            },
        });
        self.invoke(envelope, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bash_script_round_trips_json_contract() {
        if which::which("bash").is_err() {
            return;
        }
        let descriptor = ToolDescriptor::new("greet", "greets by name", serde_json::json!({}));
        let body = ScriptBody::Inline(
            r#"#!/usr/bin/env bash
cat >/dev/null
echo '{"outputs": {"greeting": "hello ada"}}'
"#
            .to_string(),
        );
        let handler = ScriptHandler::new(descriptor, RuntimeKind::Bash, body);
        let ctx = ToolCallContext {
            workflow_id: "wf".into(),
            step_id: "s1".into(),
            env: Default::default(),
        };
        let result = handler
            .call(serde_json::json!({"name": "ada"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["greeting"], "hello ada");
    }

    #[test]
    fn extension_matches_runtime() {
        assert_eq!(extension_for(RuntimeKind::Python), "py");
        assert_eq!(extension_for(RuntimeKind::Node), "js");
    }
}
