//! ABOUTME: ToolDescriptor, the model-facing JSON-schema view of a registered tool
//! ABOUTME: Shared between the tool registry (lacquer-tools) and the agent conversation loop

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// What the tool registry exposes to a provider so it can advertise the tool
/// to the model and later emit a matching tool-use block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema (`{"type": "object", "properties": {...}, "required": [...]}`).
    pub parameters: JsonValue,
}

impl ToolDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: JsonValue) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}
