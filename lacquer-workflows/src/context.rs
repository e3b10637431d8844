//! ABOUTME: RunContext, StepResult and TokenUsage - the execution-time entities of §3/§4.5
//! ABOUTME: Two separate RwLocks (state vs. step-result table) so a step result read never blocks
//! ABOUTME: on an unrelated `update_state` write

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use lacquer_core::document::Value;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Token usage accumulated across the turns of a single agent step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn accumulate(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

impl From<lacquer_providers::TokenUsage> for TokenUsage {
    fn from(value: lacquer_providers::TokenUsage) -> Self {
        Self {
            prompt_tokens: value.prompt_tokens,
            completion_tokens: value.completion_tokens,
        }
    }
}

/// Per-step lifecycle status. `Pending -> Running -> {Completed, Failed,
/// Skipped}`, with `Retrying` as a transient state between attempts and
/// `Suspended` for `human_input` (§10's Open-Question resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Retrying,
    Completed,
    Failed,
    Skipped,
    Suspended,
}

impl StepStatus {
    /// Whether this status is a final one for the step itself (the
    /// scheduler will never transition it again). Used to decide when the
    /// whole run is done, not whether a *dependent* may launch — a
    /// `Failed` dependency is terminal but does not satisfy a dependent's
    /// readiness (see `satisfies_dependency`).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether a step in this status lets a dependent step become ready.
    /// Per §4.8 a step is ready only when every dependency is `Completed`;
    /// `Skipped` also satisfies it (a downstream step reading a skipped
    /// step's absent output is itself a runtime template error, not a
    /// reason to block scheduling, per §4.6/S6). `Failed` does not satisfy
    /// it: per §7 a failed step's dependents are not launched.
    #[must_use]
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// The outcome of a single step execution, written once to terminal state
/// and read-only thereafter.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub output: BTreeMap<String, Value>,
    pub raw_response: Option<String>,
    pub usage: TokenUsage,
    pub error: Option<String>,
}

impl StepResult {
    #[must_use]
    pub fn pending(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            duration: None,
            output: BTreeMap::new(),
            raw_response: None,
            usage: TokenUsage::default(),
            error: None,
        }
    }

    /// Resolve a well-known field (`output`, `response`, `result`, `status`,
    /// `duration`, `error`, `success`, `failed`) or a declared output-schema
    /// key, the way the template engine's `steps.X.Y` resolution rule does.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.output.get(name) {
            return Some(v.clone());
        }
        match name {
            "output" | "response" | "result" => self.raw_response.clone().map(Value::String),
            "status" => Some(Value::String(format!("{:?}", self.status).to_lowercase())),
            "duration" => self.duration.map(|d| Value::Float(d.as_secs_f64())),
            "error" => self.error.clone().map(Value::String),
            "success" => Some(Value::Bool(self.status == StepStatus::Completed)),
            "failed" => Some(Value::Bool(self.status == StepStatus::Failed)),
            _ => None,
        }
    }
}

/// The per-execution mutable state carrying inputs, state, step results,
/// and a cancellation token. Exclusively owned by a single workflow
/// execution; shared read/write across every runner via `Arc<RunContext>`.
pub struct RunContext {
    pub run_id: Uuid,
    pub cancellation: CancellationToken,
    pub started_at: DateTime<Utc>,
    pub inputs: BTreeMap<String, Value>,
    state: RwLock<BTreeMap<String, Value>>,
    step_results: RwLock<IndexMap<String, StepResult>>,
    outputs: RwLock<BTreeMap<String, Value>>,
    /// A human_input suspension's resolved value, keyed by step id; set by
    /// `resume_human_input` and consumed by the action runner.
    human_input: RwLock<BTreeMap<String, Value>>,
}

impl RunContext {
    #[must_use]
    pub fn new(inputs: BTreeMap<String, Value>, initial_state: BTreeMap<String, Value>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
            started_at: Utc::now(),
            inputs,
            state: RwLock::new(initial_state),
            step_results: RwLock::new(IndexMap::new()),
            outputs: RwLock::new(BTreeMap::new()),
            human_input: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn state_get(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    pub fn state_set(&self, key: String, value: Value) {
        self.state.write().insert(key, value);
    }

    #[must_use]
    pub fn state_snapshot(&self) -> BTreeMap<String, Value> {
        self.state.read().clone()
    }

    /// Insert a step's initial `Pending` entry, called once when the
    /// scheduler compiles the run.
    pub fn register_step(&self, step_id: &str) {
        self.step_results
            .write()
            .entry(step_id.to_string())
            .or_insert_with(|| StepResult::pending(step_id));
    }

    pub fn transition(&self, step_id: &str, status: StepStatus) {
        if let Some(result) = self.step_results.write().get_mut(step_id) {
            if status == StepStatus::Running && result.start_time.is_none() {
                result.start_time = Some(Utc::now());
            }
            result.status = status;
        }
    }

    /// Write a step's terminal outcome. Called exactly once per attempt;
    /// retries re-enter via `transition(.., Retrying)` before calling this
    /// again on the next attempt's outcome.
    pub fn complete_step(&self, mut result: StepResult) {
        let now = Utc::now();
        result.end_time = Some(now);
        if let Some(start) = result.start_time {
            result.duration = Some((now - start).to_std().unwrap_or_default());
        }
        self.step_results.write().insert(result.step_id.clone(), result);
    }

    #[must_use]
    pub fn step_result(&self, step_id: &str) -> Option<StepResult> {
        self.step_results.read().get(step_id).cloned()
    }

    #[must_use]
    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.step_results.read().get(step_id).map(|r| r.status)
    }

    #[must_use]
    pub fn completed_step_ids(&self) -> Vec<String> {
        self.step_results
            .read()
            .iter()
            .filter(|(_, r)| r.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[must_use]
    pub fn all_terminal(&self) -> bool {
        self.step_results.read().values().all(|r| r.status.is_terminal())
    }

    pub fn set_output(&self, name: String, value: Value) {
        self.outputs.write().insert(name, value);
    }

    #[must_use]
    pub fn outputs_snapshot(&self) -> BTreeMap<String, Value> {
        self.outputs.read().clone()
    }

    /// External entry point feeding a `human_input` suspension (§10's Open
    /// Question resolution); the transport that calls this is out of scope.
    pub fn resume_human_input(&self, step_id: &str, value: Value) {
        self.human_input.write().insert(step_id.to_string(), value);
    }

    #[must_use]
    pub fn take_human_input(&self, step_id: &str) -> Option<Value> {
        self.human_input.write().remove(step_id)
    }
}
