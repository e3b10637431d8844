//! ABOUTME: Script-kind step runner - always invokes `run:` through bash
//! ABOUTME: `ScriptStepDef` carries no per-step runtime field, unlike tool-level script handlers which pick
//! ABOUTME: an interpreter from `requirements.runtimes`; a step's `run:` is always a shell command/script

use super::sandbox;
use lacquer_core::error::ExecutionError;
use lacquer_utils::ScratchWorkspace;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Run `run` as a bash script inside a fresh scratch workspace, feeding
/// `envelope` on stdin and parsing the `outputs` object out of its stdout,
/// per the same wire contract tool-level script handlers use.
pub async fn run(
    run: &str,
    envelope: &JsonValue,
    step_id: &str,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> Result<JsonValue, ExecutionError> {
    let workspace = ScratchWorkspace::new(step_id).map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("failed to provision scratch workspace: {e}"),
    })?;

    let mut command = Command::new("bash");
    command.arg("-c").arg(run).env("LACQUER_WORKSPACE", workspace.path());

    let payload = serde_json::to_vec(envelope).map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("failed to serialize script stdin: {e}"),
    })?;

    let outcome = sandbox::run_sandboxed(command, &payload, step_id, timeout, cancellation).await?;

    let parsed: JsonValue = serde_json::from_slice(&outcome.stdout).map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("script stdout was not valid JSON: {e}"),
    })?;

    parsed.get("outputs").cloned().ok_or_else(|| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: "script stdout JSON missing an 'outputs' key".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash_available() -> bool {
        std::path::Path::new("/bin/bash").exists() || std::path::Path::new("/usr/bin/bash").exists()
    }

    #[tokio::test]
    async fn bash_script_round_trips_outputs() {
        if !bash_available() {
            return;
        }
        let script = "cat >/dev/null; echo '{\"outputs\": {\"greeting\": \"hi\"}}'";
        let envelope = serde_json::json!({"inputs": {"name": "ada"}});
        let result = run(script, &envelope, "s1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result["greeting"], "hi");
    }

    #[tokio::test]
    async fn non_zero_exit_surfaces_stderr() {
        if !bash_available() {
            return;
        }
        let script = "echo boom >&2; exit 2";
        let envelope = serde_json::json!({});
        let err = run(script, &envelope, "s1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ExecutionError::NonZeroExit { status, stderr, .. } => {
                assert_eq!(status, 2);
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
