//! ABOUTME: Executor dispatch (C6) - one runner per step kind, sharing the sandbox/template helpers
//! ABOUTME: The scheduler decides *when* a step runs; `Dispatcher::run_step` only decides *how*

pub mod action;
pub mod container;
pub mod script;
pub mod sandbox;

use crate::context::{RunContext, TokenUsage};
use crate::template::{self, Namespace};
use container::ContainerRuntime;
use lacquer_config::EngineConfig;
use lacquer_core::document::{
    ActionStepDef, AgentConfigDef, BlockStepDef, ContainerStepDef, ScriptStepDef, StepDef, StepKind, Value,
    WorkflowDocument,
};
use lacquer_core::error::{ExecutionError, TemplateError};
use lacquer_events::EventBus;
use lacquer_providers::{ProviderConfig, ProviderRegistry};
use lacquer_tools::ToolRegistry;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;

/// The result of running a single step's body, before the scheduler folds
/// it into a `StepResult` and transitions the step's status.
pub enum StepOutcome {
    Completed {
        output: BTreeMap<String, Value>,
        raw_response: Option<String>,
        usage: TokenUsage,
    },
    /// `human_input` parked waiting for `RunContext::resume_human_input`.
    Suspended,
}

/// Everything a step runner needs, borrowed for the lifetime of one
/// execution. Cheap to construct per step since it only holds references.
pub struct Dispatcher<'a> {
    document: &'a WorkflowDocument,
    run: &'a RunContext,
    tool_registry: &'a ToolRegistry,
    provider_registry: &'a ProviderRegistry,
    container_runtime: &'a dyn ContainerRuntime,
    config: &'a EngineConfig,
    events: &'a EventBus,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(
        document: &'a WorkflowDocument,
        run: &'a RunContext,
        tool_registry: &'a ToolRegistry,
        provider_registry: &'a ProviderRegistry,
        container_runtime: &'a dyn ContainerRuntime,
        config: &'a EngineConfig,
        events: &'a EventBus,
    ) -> Self {
        Self {
            document,
            run,
            tool_registry,
            provider_registry,
            container_runtime,
            config,
            events,
        }
    }

    /// Run `step`'s body. `iteration` is `Some(n)` only while re-entering a
    /// `while` step's sub-steps, so `steps.<self>.iteration` resolves.
    pub async fn run_step(&self, step: &'a StepDef, iteration: Option<u64>) -> Result<StepOutcome, ExecutionError> {
        let ns = match iteration {
            Some(n) => Namespace::new(self.document, self.run).with_current_step(&step.id, n),
            None => Namespace::new(self.document, self.run),
        };
        let timeout = step.timeout.unwrap_or_else(|| self.config.scheduler.default_timeout());

        let outcome = match &step.kind {
            StepKind::Agent(agent_step) => self.run_agent(step, agent_step, &ns, timeout).await?,
            StepKind::Script(script_step) => self.run_script(step, script_step, &ns, timeout).await?,
            StepKind::Container(container_step) => self.run_container(step, container_step, &ns, timeout).await?,
            StepKind::Block(block_step) => self.run_block(step, block_step, &ns).await?,
            StepKind::Action(action_step) => self.run_action(step, action_step, &ns)?,
        };

        if let StepOutcome::Completed { .. } = &outcome {
            if !step.updates.is_empty() {
                let rendered = render_map(&step.updates, &ns)
                    .map_err(|message| ExecutionError::TemplateRender { step: step.id.clone(), message })?;
                for (key, value) in rendered {
                    self.run.state_set(key, value);
                }
            }
        }

        Ok(outcome)
    }

    async fn run_agent(
        &self,
        step: &StepDef,
        agent_step: &lacquer_core::document::AgentStepDef,
        ns: &Namespace<'_>,
        timeout: Duration,
    ) -> Result<StepOutcome, ExecutionError> {
        let agent_config = resolve_agent_config(self.document, &agent_step.agent).ok_or_else(|| {
            ExecutionError::MissingRuntime {
                step: step.id.clone(),
                runtime: agent_step.agent.clone(),
            }
        })?;

        let provider_name = agent_config
            .provider
            .clone()
            .or_else(|| self.config.providers.provider.clone())
            .ok_or_else(|| ExecutionError::MissingRuntime {
                step: step.id.clone(),
                runtime: "provider".to_string(),
            })?;
        let model = agent_config
            .model
            .clone()
            .or_else(|| self.config.providers.model.clone())
            .unwrap_or_default();

        let provider = self
            .provider_registry
            .create(ProviderConfig::new(provider_name, model))
            .await
            .map_err(|e| ExecutionError::Provider { message: e.to_string() })?;

        let prompt = render_text(&agent_step.prompt, ns, &step.id)?;
        let system_prompt = agent_config
            .system_prompt
            .as_deref()
            .map(|text| render_text(text, ns, &step.id))
            .transpose()?;

        let tools = self.tool_registry.descriptors_for(&agent_config.tools);

        let request = lacquer_agents::AgentRunRequest {
            agent_name: agent_step.agent.clone(),
            step_id: step.id.clone(),
            system_prompt,
            prompt,
            temperature: agent_config.temperature,
            top_p: agent_config.top_p,
            max_tokens: agent_config.max_tokens,
            tools,
            max_turns: self.config.agent.max_turns,
            provider,
            tool_registry: self.tool_registry,
        };

        let outcome = match tokio::time::timeout(timeout, lacquer_agents::run(request, &self.run.cancellation)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExecutionError::Timeout {
                    step: step.id.clone(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        };

        let mut output = lacquer_agents::coerce_output(&step.outputs, &outcome.response);
        output
            .entry("response".to_string())
            .or_insert_with(|| Value::String(outcome.response.clone()));

        Ok(StepOutcome::Completed {
            output,
            raw_response: Some(outcome.response),
            usage: outcome.usage.into(),
        })
    }

    async fn run_script(
        &self,
        step: &StepDef,
        script_step: &ScriptStepDef,
        ns: &Namespace<'_>,
        timeout: Duration,
    ) -> Result<StepOutcome, ExecutionError> {
        let rendered_with = render_map(&step.with, ns)
            .map_err(|message| ExecutionError::TemplateRender { step: step.id.clone(), message })?;
        let run = render_text(&script_step.run, ns, &step.id)?;
        let envelope = step_envelope(self.run.run_id.to_string(), &step.id, &rendered_with);

        let outputs = script::run(&run, &envelope, &step.id, timeout, &self.run.cancellation).await?;
        Ok(StepOutcome::Completed {
            output: json_outputs_to_map(&step.id, outputs)?,
            raw_response: None,
            usage: TokenUsage::default(),
        })
    }

    async fn run_container(
        &self,
        step: &StepDef,
        container_step: &ContainerStepDef,
        ns: &Namespace<'_>,
        timeout: Duration,
    ) -> Result<StepOutcome, ExecutionError> {
        let rendered_with = render_map(&step.with, ns)
            .map_err(|message| ExecutionError::TemplateRender { step: step.id.clone(), message })?;
        let command = container_step
            .command
            .iter()
            .map(|entry| render_text(entry, ns, &step.id))
            .collect::<Result<Vec<_>, _>>()?;
        let envelope = step_envelope(self.run.run_id.to_string(), &step.id, &rendered_with);

        let outputs = container::run(
            self.container_runtime,
            &container_step.container,
            &command,
            &envelope,
            &step.id,
            timeout,
            &self.run.cancellation,
        )
        .await?;
        Ok(StepOutcome::Completed {
            output: json_outputs_to_map(&step.id, outputs)?,
            raw_response: None,
            usage: TokenUsage::default(),
        })
    }

    /// Only the `./path` local-file reference form is resolvable without a
    /// package registry or network fetch; `lacquer/...` and `github.com/...`
    /// references sit behind the same external-collaborator boundary as a
    /// real Docker daemon.
    async fn run_block(
        &self,
        step: &StepDef,
        block: &BlockStepDef,
        ns: &Namespace<'_>,
    ) -> Result<StepOutcome, ExecutionError> {
        let rendered_with = render_map(&step.with, ns)
            .map_err(|message| ExecutionError::TemplateRender { step: step.id.clone(), message })?;

        let outputs = run_sub_workflow_file(
            &step.id,
            &block.uses,
            rendered_with,
            self.tool_registry,
            self.provider_registry,
            self.container_runtime,
            self.config,
            self.events,
        )
        .await?;

        Ok(StepOutcome::Completed {
            output: outputs,
            raw_response: None,
            usage: TokenUsage::default(),
        })
    }

    fn run_action(&self, step: &StepDef, action_step: &ActionStepDef, ns: &Namespace<'_>) -> Result<StepOutcome, ExecutionError> {
        match action_step {
            ActionStepDef::UpdateState { updates } => {
                let rendered = render_map(updates, ns)
                    .map_err(|message| ExecutionError::TemplateRender { step: step.id.clone(), message })?;
                match action::update_state(self.run, &rendered) {
                    action::ActionOutcome::Completed { output } => Ok(StepOutcome::Completed {
                        output,
                        raw_response: None,
                        usage: TokenUsage::default(),
                    }),
                    action::ActionOutcome::Suspended => Ok(StepOutcome::Suspended),
                }
            }
            ActionStepDef::HumanInput { .. } => match action::human_input(self.run, &step.id) {
                action::ActionOutcome::Completed { output } => Ok(StepOutcome::Completed {
                    output,
                    raw_response: None,
                    usage: TokenUsage::default(),
                }),
                action::ActionOutcome::Suspended => Ok(StepOutcome::Suspended),
            },
        }
    }
}

/// Load, validate and run a sub-workflow from a `./path` reference,
/// returning its declared `outputs:`. Shared by the step-kind block runner
/// above and by [`crate::subworkflow::EngineSubWorkflowRunner`], which an
/// agent's tool-kind block dispatches through instead.
///
/// Only the local-file reference form is resolvable without a package
/// registry or network fetch; `lacquer/...` and `github.com/...` references
/// sit behind the same external-collaborator boundary as a real Docker
/// daemon.
pub(crate) async fn run_sub_workflow_file(
    step_id: &str,
    reference: &str,
    inputs: BTreeMap<String, Value>,
    tool_registry: &ToolRegistry,
    provider_registry: &ProviderRegistry,
    container_runtime: &dyn ContainerRuntime,
    config: &EngineConfig,
    events: &EventBus,
) -> Result<BTreeMap<String, Value>, ExecutionError> {
    if !reference.starts_with("./") {
        return Err(ExecutionError::UnsupportedReference {
            step: step_id.to_string(),
            reference: reference.to_string(),
        });
    }

    let source = tokio::fs::read_to_string(reference)
        .await
        .map_err(|e| ExecutionError::NonZeroExit {
            step: step_id.to_string(),
            status: -1,
            stderr: format!("failed to read sub-workflow '{reference}': {e}"),
        })?;
    let sub_document = crate::parser::parse(&source).map_err(|report| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("sub-workflow '{reference}' failed to parse ({} issue(s))", report.errors().len()),
    })?;
    let validation = crate::validator::validate(&sub_document);
    if !validation.valid() {
        return Err(ExecutionError::NonZeroExit {
            step: step_id.to_string(),
            status: -1,
            stderr: format!("sub-workflow '{reference}' failed validation ({} issue(s))", validation.errors().len()),
        });
    }

    let sub_run = RunContext::new(inputs, sub_document.state.clone());

    crate::scheduler::execute(
        &sub_document,
        &sub_run,
        tool_registry,
        provider_registry,
        container_runtime,
        config,
        events,
    )
    .await
    .map_err(|e| ExecutionError::NonZeroExit {
        step: step_id.to_string(),
        status: -1,
        stderr: format!("sub-workflow '{reference}' failed: {e}"),
    })?;

    Ok(sub_run.outputs_snapshot())
}

fn resolve_agent_config<'a>(document: &'a WorkflowDocument, name: &str) -> Option<&'a AgentConfigDef> {
    let mut current = document.agents.get(name)?;
    let mut seen = std::collections::HashSet::new();
    seen.insert(name.to_string());
    while let Some(target) = &current.uses {
        if !seen.insert(target.clone()) {
            break;
        }
        current = document.agents.get(target)?;
    }
    Some(current)
}

fn render_text(text: &str, ns: &Namespace<'_>, step_id: &str) -> Result<String, ExecutionError> {
    template::render(text, ns)
        .map(|v| v.to_template_string())
        .map_err(|e| ExecutionError::TemplateRender { step: step_id.to_string(), message: e.to_string() })
}

fn render_value(value: &Value, ns: &Namespace<'_>) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => template::render(s, ns),
        Value::List(items) => Ok(Value::List(
            items.iter().map(|v| render_value(v, ns)).collect::<Result<_, _>>()?,
        )),
        Value::Map(entries) => Ok(Value::Map(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), render_value(v, ns)?)))
                .collect::<Result<_, TemplateError>>()?,
        )),
        other => Ok(other.clone()),
    }
}

fn render_map(map: &BTreeMap<String, Value>, ns: &Namespace<'_>) -> Result<BTreeMap<String, Value>, String> {
    map.iter()
        .map(|(k, v)| render_value(v, ns).map(|rendered| (k.clone(), rendered)).map_err(|e| e.to_string()))
        .collect()
}

fn step_envelope(run_id: String, step_id: &str, inputs: &BTreeMap<String, Value>) -> JsonValue {
    serde_json::json!({
        "inputs": JsonValue::from(Value::Map(inputs.clone())),
        "env": {},
        "context": {
            "workflowId": run_id,
            "stepId": step_id,
        },
    })
}

fn json_outputs_to_map(step_id: &str, outputs: JsonValue) -> Result<BTreeMap<String, Value>, ExecutionError> {
    match outputs {
        JsonValue::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        other => Err(ExecutionError::NonZeroExit {
            step: step_id.to_string(),
            status: -1,
            stderr: format!("expected an 'outputs' object, got {other}"),
        }),
    }
}
