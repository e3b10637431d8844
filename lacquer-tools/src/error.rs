//! ABOUTME: Error type for tool resolution and invocation failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("tool '{tool}' required runtime '{runtime}' which is not available on PATH")]
    MissingRuntime { tool: String, runtime: String },

    #[error("tool '{tool}' exited with status {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("tool '{tool}' produced output that was not valid JSON: {message}")]
    MalformedOutput { tool: String, message: String },

    #[error("tool '{tool}' timed out")]
    Timeout { tool: String },

    #[error("tool '{tool}' invocation failed: {message}")]
    ExecutionFailed { tool: String, message: String },

    #[error("tool '{tool}' is not implemented: {reason}")]
    NotImplemented { tool: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
