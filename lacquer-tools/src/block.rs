//! ABOUTME: Block-kind tool handler - dispatches to a sub-workflow runner
//! ABOUTME: The runner itself is injected (implemented by lacquer-workflows) to avoid a crate cycle

use crate::error::ToolError;
use crate::handler::{ToolCallContext, ToolHandler};
use async_trait::async_trait;
use lacquer_core::document::Value;
use lacquer_core::types::ToolDescriptor;
use lacquer_core::SubWorkflowRunner;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct BlockHandler {
    descriptor: ToolDescriptor,
    reference: String,
    runner: Arc<dyn SubWorkflowRunner>,
}

impl BlockHandler {
    #[must_use]
    pub fn new(descriptor: ToolDescriptor, reference: String, runner: Arc<dyn SubWorkflowRunner>) -> Self {
        Self {
            descriptor,
            reference,
            runner,
        }
    }
}

#[async_trait]
impl ToolHandler for BlockHandler {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, input: JsonValue, _ctx: &ToolCallContext) -> Result<JsonValue, ToolError> {
        let inputs: BTreeMap<String, Value> = match input {
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
            other => {
                return Err(ToolError::ExecutionFailed {
                    tool: self.descriptor.name.clone(),
                    message: format!("block inputs must be an object, got {other}"),
                })
            }
        };

        let outputs = self
            .runner
            .run(&self.reference, inputs)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: self.descriptor.name.clone(),
                message: e.to_string(),
            })?;

        Ok(JsonValue::Object(
            outputs
                .into_iter()
                .map(|(k, v)| (k, JsonValue::from(v)))
                .collect(),
        ))
    }
}
