//! ABOUTME: ToolRegistry - resolves tool names to handlers, immutable once built for a run
//! ABOUTME: Populated at compile time from `agents.*.tools`; publishes model-facing descriptors

use crate::error::ToolError;
use crate::handler::{ToolCallContext, ToolHandler};
use lacquer_core::types::ToolDescriptor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable, read-lock-free once built: every handler is registered before
/// the first step runs, and the registry is never mutated during execution.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers
            .insert(handler.descriptor().name.clone(), handler);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// The model-facing descriptors for a named subset (an agent's declared
    /// `tools:` list), in declaration order.
    #[must_use]
    pub fn descriptors_for(&self, names: &[String]) -> Vec<ToolDescriptor> {
        names
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.descriptor().clone())
            .collect()
    }

    /// Invoke a tool by name, surfacing `UnknownTool` for anything not
    /// registered at compile time (step/agent validation should have already
    /// caught this, but the registry itself stays strict).
    pub async fn call(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        let handler = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool { name: name.to_string() })?;
        handler.call(input, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo(ToolDescriptor);

    #[async_trait]
    impl ToolHandler for Echo {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }
        async fn call(
            &self,
            input: serde_json::Value,
            _ctx: &ToolCallContext,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn registers_and_resolves_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo(ToolDescriptor::new(
            "echo",
            "echoes input",
            serde_json::json!({}),
        ))));

        let ctx = ToolCallContext::default();
        let out = registry
            .call("echo", serde_json::json!({"a": 1}), &ctx)
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let ctx = ToolCallContext::default();
        let err = registry
            .call("missing", serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[test]
    fn descriptors_for_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo(ToolDescriptor::new("b", "", serde_json::json!({})))));
        registry.register(Arc::new(Echo(ToolDescriptor::new("a", "", serde_json::json!({})))));
        let names = vec!["a".to_string(), "b".to_string()];
        let descriptors = registry.descriptors_for(&names);
        assert_eq!(descriptors[0].name, "a");
        assert_eq!(descriptors[1].name, "b");
    }
}
