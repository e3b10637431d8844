//! ABOUTME: MCP-kind tool handler - forwards tools/call to a Model Context Protocol endpoint
//! ABOUTME: Local servers are a real subprocess+JSON-RPC transport; remote transport is an external
//! ABOUTME: collaborator per the engine's scope and is exposed only as a capability

use crate::error::ToolError;
use crate::handler::{ToolCallContext, ToolHandler};
use async_trait::async_trait;
use lacquer_core::types::ToolDescriptor;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Authentication scheme for a remote MCP endpoint.
#[derive(Debug, Clone)]
pub enum McpAuth {
    OAuth2 { token: String },
    ApiKey { key: String },
    Basic { username: String, password: String },
    None,
}

/// Where to reach the MCP server: a locally-launched subprocess, or a
/// remote endpoint reached by URL.
#[derive(Debug, Clone)]
pub enum McpTransport {
    Local {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    Remote {
        url: String,
        auth: McpAuthConfig,
    },
}

#[derive(Debug, Clone)]
pub struct McpAuthConfig(pub McpAuth);

pub struct McpHandler {
    descriptor: ToolDescriptor,
    /// The tool name as known to the MCP server (may differ from the
    /// engine-facing `descriptor.name` if the document aliases it).
    remote_tool_name: String,
    transport: McpTransport,
}

impl McpHandler {
    #[must_use]
    pub fn new(descriptor: ToolDescriptor, remote_tool_name: String, transport: McpTransport) -> Self {
        Self {
            descriptor,
            remote_tool_name,
            transport,
        }
    }

    async fn call_local(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        input: JsonValue,
    ) -> Result<JsonValue, ToolError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": self.remote_tool_name, "arguments": input },
        });

        if let Some(mut stdin) = child.stdin.take() {
            let mut payload = serde_json::to_vec(&request).map_err(|e| ToolError::MalformedOutput {
                tool: self.descriptor.name.clone(),
                message: e.to_string(),
            })?;
            payload.push(b'\n');
            stdin.write_all(&payload).await?;
        }

        let stdout = child.stdout.take().expect("stdout was piped");
        let mut reader = BufReader::new(stdout).lines();
        let line = reader.next_line().await?.ok_or_else(|| ToolError::MalformedOutput {
            tool: self.descriptor.name.clone(),
            message: "MCP server closed stdout without a response".into(),
        })?;
        let _ = child.kill().await;

        let response: JsonValue =
            serde_json::from_str(&line).map_err(|e| ToolError::MalformedOutput {
                tool: self.descriptor.name.clone(),
                message: e.to_string(),
            })?;

        if let Some(error) = response.get("error") {
            return Err(ToolError::ExecutionFailed {
                tool: self.descriptor.name.clone(),
                message: error.to_string(),
            });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| ToolError::MalformedOutput {
                tool: self.descriptor.name.clone(),
                message: "JSON-RPC response missing 'result'".into(),
            })
    }
}

#[async_trait]
impl ToolHandler for McpHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, input: JsonValue, _ctx: &ToolCallContext) -> Result<JsonValue, ToolError> {
        match &self.transport {
            McpTransport::Local { command, args, env } => {
                self.call_local(command, args, env, input).await
            }
            McpTransport::Remote { .. } => Err(ToolError::NotImplemented {
                tool: self.descriptor.name.clone(),
                reason: "remote MCP transport is an external collaborator; only local \
                         subprocess servers are dispatched in-process"
                    .into(),
            }),
        }
    }
}
