//! ABOUTME: Concrete SubWorkflowRunner - the capability lacquer-tools::BlockHandler dispatches
//! ABOUTME: through for an agent's tool-kind block, reusing the same path a step-kind block runs

use crate::executor::container::ContainerRuntime;
use crate::executor::run_sub_workflow_file;
use async_trait::async_trait;
use lacquer_config::EngineConfig;
use lacquer_core::document::Value;
use lacquer_core::error::{LacquerError, Result};
use lacquer_core::SubWorkflowRunner;
use lacquer_events::EventBus;
use lacquer_providers::ProviderRegistry;
use lacquer_tools::ToolRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runs a `./path` sub-workflow reference to completion by recursively
/// compiling and scheduling it, the same way the step-kind block runner in
/// [`crate::executor`] does. Held by `Arc` so it can be cloned into every
/// [`lacquer_tools::BlockHandler`] an agent's `tools:` list references.
pub struct EngineSubWorkflowRunner {
    tool_registry: Arc<ToolRegistry>,
    provider_registry: Arc<ProviderRegistry>,
    container_runtime: Arc<dyn ContainerRuntime>,
    config: Arc<EngineConfig>,
    events: EventBus,
}

impl EngineSubWorkflowRunner {
    #[must_use]
    pub fn new(
        tool_registry: Arc<ToolRegistry>,
        provider_registry: Arc<ProviderRegistry>,
        container_runtime: Arc<dyn ContainerRuntime>,
        config: Arc<EngineConfig>,
        events: EventBus,
    ) -> Self {
        Self {
            tool_registry,
            provider_registry,
            container_runtime,
            config,
            events,
        }
    }
}

#[async_trait]
impl SubWorkflowRunner for EngineSubWorkflowRunner {
    async fn run(&self, reference: &str, inputs: BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>> {
        run_sub_workflow_file(
            "<tool-block>",
            reference,
            inputs,
            &self.tool_registry,
            &self.provider_registry,
            self.container_runtime.as_ref(),
            &self.config,
            &self.events,
        )
        .await
        .map_err(LacquerError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::LocalProcessContainerRuntime;
    use std::io::Write;

    #[tokio::test]
    async fn runs_a_local_sub_workflow_file_and_returns_its_outputs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
version: "1.0"
metadata:
  name: child
inputs:
  name: string
state:
  greeting: ""
steps:
  - id: greet
    action: update_state
    updates:
      greeting: "hello {{{{ inputs.name }}}}"
outputs:
  greeting: "{{{{ state.greeting }}}}"
"#
        )
        .unwrap();
        let path = format!("./{}", file.path().file_name().unwrap().to_string_lossy());
        std::fs::copy(file.path(), &path).unwrap();

        let runner = EngineSubWorkflowRunner::new(
            Arc::new(ToolRegistry::new()),
            Arc::new(ProviderRegistry::new()),
            Arc::new(LocalProcessContainerRuntime),
            Arc::new(EngineConfig::defaults()),
            EventBus::new(),
        );

        let mut inputs = BTreeMap::new();
        inputs.insert("name".to_string(), Value::String("ada".to_string()));
        let result = runner.run(&path, inputs).await;
        std::fs::remove_file(&path).ok();

        let outputs = result.unwrap();
        assert_eq!(outputs.get("greeting"), Some(&Value::String("hello ada".to_string())));
    }
}
