//! ABOUTME: Scheduler (C8) - compiles a step DAG from template cross-references, drives it at a
//! ABOUTME: bounded concurrency, and owns retry/backoff, condition/skip_if and `while` loop semantics

use crate::context::{RunContext, StepResult, StepStatus, TokenUsage};
use crate::executor::container::ContainerRuntime;
use crate::executor::{Dispatcher, StepOutcome};
use crate::template::{self, Namespace};
use crate::validator::semantic::step_template_strings;
use futures::stream::{self, StreamExt};
use lacquer_config::EngineConfig;
use lacquer_core::document::{BackoffStrategy, OnErrorPolicy, StepDef, Value, WorkflowDocument};
use lacquer_core::error::ExecutionError;
use lacquer_events::{EventBus, WorkflowEvent};
use lacquer_providers::ProviderRegistry;
use lacquer_tools::ToolRegistry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

/// A `while` step safety valve. §1's non-goals exclude durable/distributed
/// execution but say nothing about a workflow author writing a condition
/// that never goes false; without this a buggy workflow would hang a run
/// forever instead of failing it.
const MAX_WHILE_ITERATIONS: u64 = 10_000;

/// Build `deps[stepId]` for a flat step list by walking every
/// template-bearing field, same fields the semantic validator walks.
fn build_dependency_graph(steps: &[StepDef]) -> Result<HashMap<String, HashSet<String>>, ExecutionError> {
    let ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    let mut deps = HashMap::new();
    for step in steps {
        let mut refs = HashSet::new();
        for text in step_template_strings(step) {
            let spans = template::extract_spans(&text).map_err(|e| ExecutionError::TemplateRender {
                step: step.id.clone(),
                message: e.to_string(),
            })?;
            for span in spans {
                for referenced in template::step_refs(&span.expr) {
                    if referenced != step.id && ids.contains(referenced.as_str()) {
                        refs.insert(referenced);
                    }
                }
            }
        }
        deps.insert(step.id.clone(), refs);
    }
    Ok(deps)
}

/// Drive `document`'s top-level steps to completion against a fresh or
/// already-populated `run`, then evaluate `outputs:`. Steps launch as soon
/// as every dependency is `Completed` or `Skipped` (a `Failed` dependency
/// blocks its dependents instead of satisfying them), at most
/// `config.scheduler.max_concurrent_steps` running at once.
pub async fn execute(
    document: &WorkflowDocument,
    run: &RunContext,
    tool_registry: &ToolRegistry,
    provider_registry: &ProviderRegistry,
    container_runtime: &dyn ContainerRuntime,
    config: &EngineConfig,
    events: &EventBus,
) -> Result<(), ExecutionError> {
    let deps = build_dependency_graph(&document.steps)?;
    let index_of: HashMap<&str, usize> =
        document.steps.iter().enumerate().map(|(i, s)| (s.id.as_str(), i)).collect();

    for step in &document.steps {
        run.register_step(&step.id);
    }

    events.publish(WorkflowEvent::WorkflowStarted { run_id: run.run_id, timestamp: run.started_at });

    let dispatcher = Dispatcher::new(document, run, tool_registry, provider_registry, container_runtime, config, events);
    let max_concurrent = config.scheduler.max_concurrent_steps.max(1);
    let mut launched: HashSet<String> = HashSet::new();

    while launched.len() < document.steps.len() {
        if run.cancellation.is_cancelled() {
            break;
        }

        let ready: Vec<&StepDef> = document
            .steps
            .iter()
            .filter(|s| !launched.contains(&s.id))
            .filter(|s| {
                deps.get(&s.id).is_some_and(|d| {
                    d.iter().all(|dep_id| run.step_status(dep_id).is_some_and(StepStatus::satisfies_dependency))
                })
            })
            .collect();

        if ready.is_empty() {
            // A step already `Failed` blocks every step downstream of it
            // (their deps are unmet, per §7) without this being a deadlock;
            // break out and let the post-loop check report `WorkflowFailed`.
            let any_failed = document.steps.iter().any(|s| run.step_status(&s.id) == Some(StepStatus::Failed));
            if any_failed {
                break;
            }
            let blocker = document.steps.iter().find(|s| !launched.contains(&s.id)).expect("loop invariant");
            return Err(ExecutionError::Deadlock {
                step: blocker.id.clone(),
                remaining: document.steps.len() - launched.len(),
            });
        }

        for step in &ready {
            launched.insert(step.id.clone());
        }

        // `StepStarted` is published synchronously while building each
        // batch future, before `buffer_unordered` ever polls it.
        let batch = ready.into_iter().map(|step| {
            events.publish(WorkflowEvent::StepStarted {
                run_id: run.run_id,
                step_id: step.id.clone(),
                step_index: index_of[step.id.as_str()],
            });
            run_step_to_terminal(&dispatcher, document, run, events, step)
        });

        stream::iter(batch).buffer_unordered(max_concurrent).collect::<Vec<()>>().await;
    }

    let duration = (chrono::Utc::now() - run.started_at).to_std().unwrap_or_default();

    if run.cancellation.is_cancelled() {
        events.publish(WorkflowEvent::WorkflowCancelled { run_id: run.run_id, timestamp: chrono::Utc::now(), duration });
        return Err(ExecutionError::Cancelled { step: "<workflow>".to_string() });
    }

    if let Some(step) = document.steps.iter().find(|s| run.step_status(&s.id) == Some(StepStatus::Failed)) {
        let message = run.step_result(&step.id).and_then(|r| r.error).unwrap_or_else(|| "step failed".to_string());
        events.publish(WorkflowEvent::WorkflowFailed {
            run_id: run.run_id,
            timestamp: chrono::Utc::now(),
            duration,
            error: message.clone(),
        });
        return Err(ExecutionError::NonZeroExit { step: step.id.clone(), status: -1, stderr: message });
    }

    evaluate_outputs(document, run)?;
    events.publish(WorkflowEvent::WorkflowCompleted { run_id: run.run_id, timestamp: chrono::Utc::now(), duration });
    Ok(())
}

fn evaluate_outputs(document: &WorkflowDocument, run: &RunContext) -> Result<(), ExecutionError> {
    let ns = Namespace::new(document, run);
    for (name, expr_text) in &document.outputs {
        let value = template::render(expr_text, &ns).map_err(|e| ExecutionError::TemplateRender {
            step: "<outputs>".to_string(),
            message: format!("output '{name}': {e}"),
        })?;
        run.set_output(name.clone(), value);
    }
    Ok(())
}

/// Evaluate `condition`/`skip_if`, then drive the step: a `while` step loops
/// its own body plus nested `steps:` each iteration; any other step goes
/// through the retry/backoff/`on_error` machinery exactly once per attempt
/// budget.
async fn run_step_to_terminal(
    dispatcher: &Dispatcher<'_>,
    document: &WorkflowDocument,
    run: &RunContext,
    events: &EventBus,
    step: &StepDef,
) {
    run.transition(&step.id, StepStatus::Running);
    let ns = Namespace::new(document, run);

    if let Some(condition) = &step.condition {
        match template::render(condition, &ns) {
            Ok(value) if !value.is_truthy() => return skip_step(run, events, step),
            Ok(_) => {}
            Err(e) => return fail_step(run, events, step, format!("condition failed to render: {e}")),
        }
    }
    if let Some(skip_if) = &step.skip_if {
        match template::render(skip_if, &ns) {
            Ok(value) if value.is_truthy() => return skip_step(run, events, step),
            Ok(_) => {}
            Err(e) => return fail_step(run, events, step, format!("skip_if failed to render: {e}")),
        }
    }

    if step.r#while.is_some() {
        run_while_loop(dispatcher, document, run, events, step).await;
    } else {
        run_with_retry(dispatcher, run, events, step).await;
    }
}

fn skip_step(run: &RunContext, events: &EventBus, step: &StepDef) {
    let result = finalize(run, &step.id, StepStatus::Skipped, BTreeMap::new(), None, TokenUsage::default(), None);
    run.complete_step(result);
    events.publish(WorkflowEvent::StepSkipped { run_id: run.run_id, step_id: step.id.clone() });
}

fn fail_step(run: &RunContext, events: &EventBus, step: &StepDef, message: String) {
    let result = finalize(run, &step.id, StepStatus::Failed, BTreeMap::new(), None, TokenUsage::default(), Some(message.clone()));
    run.complete_step(result);
    let duration = run.step_result(&step.id).and_then(|r| r.duration).unwrap_or_default();
    events.publish(WorkflowEvent::StepFailed { run_id: run.run_id, step_id: step.id.clone(), duration, error: message });
}

fn complete_step_ok(
    run: &RunContext,
    events: &EventBus,
    step_id: &str,
    output: BTreeMap<String, Value>,
    raw_response: Option<String>,
    usage: TokenUsage,
) {
    let result = finalize(run, step_id, StepStatus::Completed, output, raw_response, usage, None);
    run.complete_step(result);
    let duration = run.step_result(step_id).and_then(|r| r.duration).unwrap_or_default();
    events.publish(WorkflowEvent::StepCompleted { run_id: run.run_id, step_id: step_id.to_string(), duration });
}

/// Carry over the `start_time` a prior `transition(Running)` recorded, so
/// the terminal `StepResult` reports an accurate duration.
fn finalize(
    run: &RunContext,
    step_id: &str,
    status: StepStatus,
    output: BTreeMap<String, Value>,
    raw_response: Option<String>,
    usage: TokenUsage,
    error: Option<String>,
) -> StepResult {
    let mut result = run.step_result(step_id).unwrap_or_else(|| StepResult::pending(step_id));
    result.status = status;
    result.output = output;
    result.raw_response = raw_response;
    result.usage = usage;
    result.error = error;
    result
}

async fn run_with_retry(dispatcher: &Dispatcher<'_>, run: &RunContext, events: &EventBus, step: &StepDef) {
    let max_attempts = step.retry.as_ref().map_or(1, |r| r.max_attempts).max(1);
    let backoff = step.retry.as_ref().map_or(BackoffStrategy::default(), |r| r.backoff);
    let initial_delay = step.retry.as_ref().map_or(Duration::from_secs(1), |r| r.initial_delay);

    let mut last_error = String::new();
    for attempt in 1..=max_attempts {
        if attempt > 1 {
            run.transition(&step.id, StepStatus::Retrying);
            events.publish(WorkflowEvent::StepRetrying { run_id: run.run_id, step_id: step.id.clone(), attempt });
            tokio::select! {
                () = tokio::time::sleep(backoff_delay(backoff, initial_delay, attempt)) => {}
                () = run.cancellation.cancelled() => return,
            }
            run.transition(&step.id, StepStatus::Running);
        }

        match dispatcher.run_step(step, None).await {
            Ok(StepOutcome::Completed { output, raw_response, usage }) => {
                return complete_step_ok(run, events, &step.id, output, raw_response, usage);
            }
            Ok(StepOutcome::Suspended) => {
                let mut result = run.step_result(&step.id).unwrap_or_else(|| StepResult::pending(&step.id));
                result.status = StepStatus::Suspended;
                run.complete_step(result);
                return;
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    match &step.on_error {
        Some(OnErrorPolicy::Fallback { value }) => {
            let mut output = BTreeMap::new();
            output.insert("response".to_string(), value.clone());
            complete_step_ok(run, events, &step.id, output, None, TokenUsage::default());
        }
        Some(OnErrorPolicy::Log | OnErrorPolicy::Return) | None => fail_step(run, events, step, last_error),
    }
}

fn backoff_delay(strategy: BackoffStrategy, initial: Duration, attempt: u32) -> Duration {
    match strategy {
        BackoffStrategy::Linear => initial.saturating_mul(attempt),
        BackoffStrategy::Exponential => initial.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
    }
}

/// A `while` step re-runs its own kind-specific body each iteration
/// (resolving `steps.<self>.iteration` via `Namespace::with_current_step`),
/// followed by its nested `steps:` run sequentially within that iteration.
async fn run_while_loop(
    dispatcher: &Dispatcher<'_>,
    document: &WorkflowDocument,
    run: &RunContext,
    events: &EventBus,
    step: &StepDef,
) {
    let condition = step.r#while.as_ref().expect("caller checked r#while is Some");
    let mut iteration: u64 = 0;
    let mut last_output = BTreeMap::new();

    loop {
        if run.cancellation.is_cancelled() {
            return;
        }
        if iteration >= MAX_WHILE_ITERATIONS {
            return fail_step(run, events, step, format!("exceeded {MAX_WHILE_ITERATIONS} while iterations"));
        }

        let ns = Namespace::new(document, run).with_current_step(&step.id, iteration);
        match template::render(condition, &ns) {
            Ok(value) if !value.is_truthy() => break,
            Ok(_) => {}
            Err(e) => return fail_step(run, events, step, format!("while condition failed to render: {e}")),
        }

        match dispatcher.run_step(step, Some(iteration)).await {
            Ok(StepOutcome::Completed { output, .. }) => last_output = output,
            Ok(StepOutcome::Suspended) => {
                let mut result = run.step_result(&step.id).unwrap_or_else(|| StepResult::pending(&step.id));
                result.status = StepStatus::Suspended;
                run.complete_step(result);
                return;
            }
            Err(e) => return fail_step(run, events, step, e.to_string()),
        }

        for sub_step in &step.steps {
            run.register_step(&sub_step.id);
            run_step_to_terminal(dispatcher, document, run, events, sub_step).await;
            if run.step_status(&sub_step.id) == Some(StepStatus::Failed) {
                return fail_step(run, events, step, format!("nested step '{}' failed", sub_step.id));
            }
        }

        iteration += 1;
    }

    complete_step_ok(run, events, &step.id, last_output, None, TokenUsage::default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::container::LocalProcessContainerRuntime;
    use lacquer_core::document::{ActionStepDef, StepKind, WorkflowMetadata};
    use std::collections::BTreeMap;

    fn step(id: &str, kind: StepKind) -> StepDef {
        StepDef {
            id: id.to_string(),
            kind,
            with: BTreeMap::new(),
            outputs: BTreeMap::new(),
            condition: None,
            skip_if: None,
            updates: BTreeMap::new(),
            r#while: None,
            steps: Vec::new(),
            timeout: Some(Duration::from_secs(5)),
            retry: None,
            on_error: None,
        }
    }

    fn update_state_step(id: &str, key: &str, value: Value) -> StepDef {
        let mut updates = BTreeMap::new();
        updates.insert(key.to_string(), value);
        step(id, StepKind::Action(ActionStepDef::UpdateState { updates }))
    }

    fn document_with_steps(steps: Vec<StepDef>) -> WorkflowDocument {
        WorkflowDocument {
            version: "1.0".into(),
            metadata: WorkflowMetadata::default(),
            inputs: BTreeMap::new(),
            state: BTreeMap::new(),
            agents: BTreeMap::new(),
            requirements: Default::default(),
            steps,
            outputs: BTreeMap::new(),
            source_map: Default::default(),
        }
    }

    #[tokio::test]
    async fn independent_steps_all_complete() {
        let document = document_with_steps(vec![
            update_state_step("a", "a", Value::Int(1)),
            update_state_step("b", "b", Value::Int(2)),
        ]);
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let registry = ToolRegistry::new();
        let providers = ProviderRegistry::new();
        let container_runtime = LocalProcessContainerRuntime;
        let config = EngineConfig::defaults();
        let events = EventBus::new();

        execute(&document, &run, &registry, &providers, &container_runtime, &config, &events)
            .await
            .unwrap();

        assert_eq!(run.state_get("a"), Some(Value::Int(1)));
        assert_eq!(run.state_get("b"), Some(Value::Int(2)));
    }

    #[tokio::test]
    async fn skip_if_truthy_skips_the_step() {
        let mut skipped = update_state_step("s", "touched", Value::Bool(true));
        skipped.skip_if = Some("true".to_string());
        let document = document_with_steps(vec![skipped]);
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let registry = ToolRegistry::new();
        let providers = ProviderRegistry::new();
        let container_runtime = LocalProcessContainerRuntime;
        let config = EngineConfig::defaults();
        let events = EventBus::new();

        execute(&document, &run, &registry, &providers, &container_runtime, &config, &events)
            .await
            .unwrap();

        assert_eq!(run.step_status("s"), Some(StepStatus::Skipped));
        assert_eq!(run.state_get("touched"), None);
    }

    #[tokio::test]
    async fn while_loop_runs_until_condition_is_false() {
        let mut looped = update_state_step(
            "counter",
            "n",
            Value::Int(0), // overwritten below per-iteration via template
        );
        looped.r#while = Some("state.n < 3".to_string());
        looped.updates.clear();
        let mut with_update = BTreeMap::new();
        with_update.insert("n".to_string(), Value::String("{{ steps.counter.iteration + 1 }}".to_string()));
        if let StepKind::Action(ActionStepDef::UpdateState { updates }) = &mut looped.kind {
            *updates = with_update;
        }

        let mut state = BTreeMap::new();
        state.insert("n".to_string(), Value::Int(0));
        let document = document_with_steps(vec![looped]);
        let run = RunContext::new(BTreeMap::new(), state);
        let registry = ToolRegistry::new();
        let providers = ProviderRegistry::new();
        let container_runtime = LocalProcessContainerRuntime;
        let config = EngineConfig::defaults();
        let events = EventBus::new();

        execute(&document, &run, &registry, &providers, &container_runtime, &config, &events)
            .await
            .unwrap();

        assert_eq!(run.state_get("n"), Some(Value::Int(3)));
    }

    #[tokio::test]
    async fn failed_dependency_blocks_downstream_step_and_fails_the_run() {
        let failing = step("a", StepKind::Block(lacquer_core::document::BlockStepDef { uses: "lacquer/shared/review".to_string() }));
        let downstream = update_state_step("b", "seen", Value::String("{{ steps.a.output }}".to_string()));

        let document = document_with_steps(vec![failing, downstream]);
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let registry = ToolRegistry::new();
        let providers = ProviderRegistry::new();
        let container_runtime = LocalProcessContainerRuntime;
        let config = EngineConfig::defaults();
        let events = EventBus::new();

        let err = execute(&document, &run, &registry, &providers, &container_runtime, &config, &events)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::NonZeroExit { .. }));
        assert_eq!(run.step_status("a"), Some(StepStatus::Failed));
        assert_eq!(run.step_status("b"), Some(StepStatus::Pending), "dependent of a failed step must not launch");
    }

    #[tokio::test]
    async fn forward_referencing_dependency_is_respected() {
        let mut second = update_state_step("second", "seen", Value::String("{{ steps.first.response }}".to_string()));
        second.kind = StepKind::Action(ActionStepDef::UpdateState {
            updates: {
                let mut m = BTreeMap::new();
                m.insert("seen".to_string(), Value::String("{{ steps.first.response }}".to_string()));
                m
            },
        });
        let first = {
            let mut s = update_state_step("first", "done", Value::Bool(true));
            s.outputs.insert(
                "response".to_string(),
                lacquer_core::document::OutputFieldSchema { param_type: lacquer_core::document::ParamType::String, description: None },
            );
            s
        };

        let document = document_with_steps(vec![second, first]);
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let registry = ToolRegistry::new();
        let providers = ProviderRegistry::new();
        let container_runtime = LocalProcessContainerRuntime;
        let config = EngineConfig::defaults();
        let events = EventBus::new();

        execute(&document, &run, &registry, &providers, &container_runtime, &config, &events)
            .await
            .unwrap();

        assert_eq!(run.step_status("first"), Some(StepStatus::Completed));
        assert_eq!(run.step_status("second"), Some(StepStatus::Completed));
    }
}
