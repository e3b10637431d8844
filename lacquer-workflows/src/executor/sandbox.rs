//! ABOUTME: SandboxedProcess - process spawn shared by the script and container runners
//! ABOUTME: Races the child's own completion against a timeout and cooperative cancellation

use lacquer_core::error::ExecutionError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub struct SandboxOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Spawn `command` with `stdin_payload` piped in, killing it if `timeout`
/// elapses or `cancellation` fires before it exits on its own. `kill_on_drop`
/// means losing the race (timeout/cancel branch wins) drops the in-flight
/// `wait_with_output` future, which drops the `Child` and kills the process -
/// no explicit kill call needed.
pub async fn run_sandboxed(
    mut command: Command,
    stdin_payload: &[u8],
    step_id: &str,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> Result<SandboxOutcome, ExecutionError> {
    command
        .kill_on_drop(true)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("failed to spawn: {e}"),
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(stdin_payload).await;
    }

    tokio::select! {
        biased;
        () = cancellation.cancelled() => Err(ExecutionError::Cancelled { step: step_id.to_string() }),
        () = tokio::time::sleep(timeout) => Err(ExecutionError::Timeout {
            step: step_id.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
        result = child.wait_with_output() => {
            let output = result.map_err(|e| ExecutionError::NonZeroExit {
                step: step_id.to_string(),
                status: -1,
                stderr: format!("failed waiting for child: {e}"),
            })?;
            if !output.status.success() {
                return Err(ExecutionError::NonZeroExit {
                    step: step_id.to_string(),
                    status: output.status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
            Ok(SandboxOutcome { stdout: output.stdout, stderr: output.stderr })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash_available() -> bool {
        std::path::Path::new("/bin/bash").exists() || std::path::Path::new("/usr/bin/bash").exists()
    }

    #[tokio::test]
    async fn successful_command_returns_stdout() {
        if !bash_available() {
            return;
        }
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg("cat");
        let outcome = run_sandboxed(cmd, b"hello", "s1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.stdout, b"hello");
    }

    #[tokio::test]
    async fn timeout_kills_a_long_running_command() {
        if !bash_available() {
            return;
        }
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg("sleep 5");
        let err = run_sandboxed(cmd, b"", "s1", Duration::from_millis(50), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_the_command() {
        if !bash_available() {
            return;
        }
        let token = CancellationToken::new();
        token.cancel();
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg("sleep 5");
        let err = run_sandboxed(cmd, b"", "s1", Duration::from_secs(5), &token).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_with_stderr() {
        if !bash_available() {
            return;
        }
        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg("echo oops >&2; exit 3");
        let err = run_sandboxed(cmd, b"", "s1", Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExit { status: 3, .. }));
    }
}
