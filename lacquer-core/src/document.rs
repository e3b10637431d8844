//! ABOUTME: Typed representation of a workflow document and its sub-entities
//! ABOUTME: The document is immutable once parsed; the scheduler and executors only ever read it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The dynamically-typed value every namespace entry (inputs, state, step
/// outputs, template results) is tagged with.
///
/// Operators and function calls in the template engine dispatch on the tag;
/// coercions follow the `SafeBool` and string-interpolation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// `SafeBool` truthiness: `true`, a non-zero number, or a non-empty
    /// string other than the literal `"false"`.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty() && s != "false",
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Coerce to the string form used when interpolating into surrounding
    /// text (as opposed to a whole-field single expression, which keeps the
    /// original tag).
    #[must_use]
    pub fn to_template_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// A source position, 1-based as the parser reports it to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// Maps a dotted/JSON-pointer-like document path (`steps[2].with.topic`) to
/// the `(line, column)` where it appeared in the source. Built by the
/// parser's second pass over the raw text; kept alongside the document so
/// that validator and template errors can always recover a position even
/// though `WorkflowDocument` itself is plain typed data, not a position-
/// tagged AST.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    positions: BTreeMap<String, SourcePosition>,
}

impl SourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, position: SourcePosition) {
        self.positions.insert(path.into(), position);
    }

    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<SourcePosition> {
        self.positions.get(path).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Declared parameter type for an `inputs:` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Object,
    Array,
}

/// A declared workflow input, after the bare-scalar shorthand (`topic:
/// string` → `{type: string, required: true}`) has been expanded by the
/// parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInput {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    #[serde(default)]
    pub r#enum: Vec<Value>,
}

/// Backoff strategy for a step's `retry:` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    Exponential,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Linear
    }
}

/// Per-step retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffStrategy,
    #[serde(default = "default_initial_delay", with = "duration_secs")]
    pub initial_delay: Duration,
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}

/// What to do when a step fails after exhausting its retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum OnErrorPolicy {
    Log,
    Fallback { value: Value },
    Return,
}

/// A provider/model configuration entry under `agents:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfigDef {
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Mutually exclusive with `provider`/`model`: reuse another named
    /// agent's configuration.
    pub uses: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// A required runtime engine for script steps (`requirements.runtimes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRequirement {
    pub name: RuntimeKind,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Node,
    Go,
    Python,
    Bash,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub runtimes: Vec<RuntimeRequirement>,
}

/// Agent-kind step body: `agent: <name>` plus `prompt:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStepDef {
    pub agent: String,
    pub prompt: String,
}

/// Script-kind step body: `run:` (inline or `./path`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStepDef {
    pub run: String,
}

/// Container-kind step body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStepDef {
    pub container: String,
    pub command: Vec<String>,
}

/// Sub-workflow (block) step body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStepDef {
    pub uses: String,
}

/// Built-in action step body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionStepDef {
    UpdateState {
        updates: BTreeMap<String, Value>,
    },
    HumanInput {
        prompt: Option<String>,
    },
}

/// The one-of-five execution discriminant every step carries. Untagged so
/// that, flattened into `StepDef`, the variant is picked by which of
/// `agent`/`run`/`container`/`uses`/`action` shows up in the YAML rather
/// than by an explicit tag field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepKind {
    Agent(AgentStepDef),
    Script(ScriptStepDef),
    Container(ContainerStepDef),
    Block(BlockStepDef),
    Action(ActionStepDef),
}

/// Typed schema applied to a declared agent `outputs:` field, enabling the
/// output parser to coerce the model's final text into structured data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFieldSchema {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: Option<String>,
}

/// A single step in `steps:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default)]
    pub with: BTreeMap<String, Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputFieldSchema>,
    pub condition: Option<String>,
    pub skip_if: Option<String>,
    #[serde(default)]
    pub updates: BTreeMap<String, Value>,
    pub r#while: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDef>,
    #[serde(default, with = "opt_duration_secs")]
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub on_error: Option<OnErrorPolicy>,
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

/// Workflow-level metadata (`metadata:`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub version: Option<String>,
}

/// The parsed, validated, immutable workflow document. Shared read-only
/// across every executor for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub version: String,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub inputs: BTreeMap<String, WorkflowInput>,
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfigDef>,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default)]
    pub steps: Vec<StepDef>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    /// Not part of the YAML surface; attached by the parser's second pass.
    #[serde(skip)]
    pub source_map: SourceMap,
}

impl WorkflowDocument {
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_bool_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::String("false".into()).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("0".into()).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
    }

    #[test]
    fn default_backoff_is_linear() {
        assert_eq!(BackoffStrategy::default(), BackoffStrategy::Linear);
    }

    #[test]
    fn source_map_round_trips_positions() {
        let mut map = SourceMap::new();
        map.insert("steps[2].with.topic", SourcePosition { line: 12, column: 5 });
        assert_eq!(
            map.lookup("steps[2].with.topic"),
            Some(SourcePosition { line: 12, column: 5 })
        );
        assert_eq!(map.lookup("missing"), None);
    }
}
