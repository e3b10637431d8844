//! ABOUTME: ToolHandler trait - the uniform shape every tool kind (script/MCP/block) implements

use crate::error::ToolError;
use async_trait::async_trait;
use lacquer_core::types::ToolDescriptor;
use serde_json::Value as JsonValue;

/// Context passed to a handler for a single invocation: the rendered
/// `with:`/tool-call arguments are passed separately as `input`.
#[derive(Debug, Clone, Default)]
pub struct ToolCallContext {
    pub workflow_id: String,
    pub step_id: String,
    /// Process environment to forward to script/container handlers.
    pub env: std::collections::HashMap<String, String>,
}

/// A single resolved, invokable tool. Three kinds implement this: a
/// subprocess script, an MCP endpoint, or a sub-workflow block.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    async fn call(&self, input: JsonValue, ctx: &ToolCallContext) -> Result<JsonValue, ToolError>;
}
