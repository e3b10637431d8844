//! ABOUTME: Container-kind step runner - dispatches through a ContainerRuntime capability trait
//! ABOUTME: Only an in-tree LocalProcessContainerRuntime test double is provided; real Docker is out of scope

use super::sandbox;
use async_trait::async_trait;
use lacquer_core::error::ExecutionError;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Capability surface a concrete container backend (Docker, OCI) would
/// implement. Only a local-process test double lives in this crate.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ensure_image(&self, image: &str) -> Result<(), ExecutionError>;

    async fn run(
        &self,
        image: &str,
        command: &[String],
        stdin_payload: &[u8],
        step_id: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<Vec<u8>, ExecutionError>;
}

/// Runs the "container" by invoking `command[0]` directly as a host
/// subprocess, ignoring `image`. Stands in for a real Docker/OCI client in
/// tests and local development.
#[derive(Debug, Default)]
pub struct LocalProcessContainerRuntime;

#[async_trait]
impl ContainerRuntime for LocalProcessContainerRuntime {
    async fn ensure_image(&self, _image: &str) -> Result<(), ExecutionError> {
        Ok(())
    }

    async fn run(
        &self,
        _image: &str,
        command: &[String],
        stdin_payload: &[u8],
        step_id: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<Vec<u8>, ExecutionError> {
        let [program, args @ ..] = command else {
            return Err(ExecutionError::NonZeroExit {
                step: step_id.to_string(),
                status: -1,
                stderr: "container command must have at least one element".into(),
            });
        };
        let mut cmd = Command::new(program);
        cmd.args(args);
        let outcome = sandbox::run_sandboxed(cmd, stdin_payload, step_id, timeout, cancellation).await?;
        Ok(outcome.stdout)
    }
}

/// Run a container step through `runtime`, returning the `outputs` object
/// from the same stdin/stdout JSON envelope the script runner uses.
pub async fn run(
    runtime: &dyn ContainerRuntime,
    image: &str,
    command: &[String],
    envelope: &JsonValue,
    step_id: &str,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> Result<JsonValue, ExecutionError> {
    runtime.ensure_image(image).await?;

    let payload = serde_json::to_vec(envelope).map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("failed to serialize container stdin: {e}"),
    })?;

    let stdout = runtime
        .run(image, command, &payload, step_id, timeout, cancellation)
        .await?;

    let parsed: JsonValue = serde_json::from_slice(&stdout).map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("container stdout was not valid JSON: {e}"),
    })?;

    parsed.get("outputs").cloned().ok_or_else(|| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: "container stdout JSON missing an 'outputs' key".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash_available() -> bool {
        std::path::Path::new("/bin/bash").exists() || std::path::Path::new("/usr/bin/bash").exists()
    }

    #[tokio::test]
    async fn local_process_runtime_round_trips_outputs() {
        if !bash_available() {
            return;
        }
        let runtime = LocalProcessContainerRuntime;
        let command = vec![
            "bash".to_string(),
            "-c".to_string(),
            "cat >/dev/null; echo '{\"outputs\": {\"ok\": true}}'".to_string(),
        ];
        let envelope = serde_json::json!({"inputs": {}});
        let result = run(
            &runtime,
            "ignored:latest",
            &command,
            &envelope,
            "s1",
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let runtime = LocalProcessContainerRuntime;
        let envelope = serde_json::json!({});
        let err = run(&runtime, "img", &[], &envelope, "s1", Duration::from_secs(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExit { .. }));
    }
}
