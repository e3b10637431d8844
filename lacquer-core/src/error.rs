//! ABOUTME: Error types and handling for the lacquer engine
//! ABOUTME: Provides LacquerError enum and Result type alias

use thiserror::Error;

/// Comprehensive error enum for all lacquer operations, grouped by the
/// compile/runtime phase that raises them.
#[derive(Debug, Error)]
pub enum LacquerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("component error: {message}")]
    Component {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("tool error: {message}")]
    Tool { message: String },

    #[error("workflow error: {message}")]
    Workflow {
        message: String,
        step: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while parsing a workflow document (YAML structure, duration
/// literals, shorthand expansion).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("source document exceeds the 10 MiB size ceiling ({size} bytes)")]
    SourceTooLarge { size: usize },

    #[error("{path}: invalid YAML: {message}")]
    InvalidYaml { path: String, message: String },

    #[error("{path}: {message}")]
    Structure { path: String, message: String },

    #[error("{path}: could not parse duration literal '{literal}': {reason}")]
    DurationParse {
        path: String,
        literal: String,
        reason: String,
    },

    #[error("{path}: unknown step kind '{kind}'")]
    UnknownStepKind { path: String, kind: String },
}

/// Errors raised by the structural/AST/semantic validation layers.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{count} validation issue(s) found")]
    Report { count: usize },

    #[error("{path}: {message}")]
    Issue { path: String, message: String },

    #[error("{message}")]
    Field {
        message: String,
        field: Option<String>,
    },

    #[error("{path}: cycle detected in step dependencies: {cycle}")]
    Cycle { path: String, cycle: String },

    #[error("{path}: step '{reference}' is referenced before it is declared")]
    ForwardReference { path: String, reference: String },

    #[error("{path}: unknown identifier '{name}'")]
    UnknownIdentifier { path: String, name: String },
}

/// Errors raised while lexing, parsing, or evaluating `{{ }}` template
/// expressions.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEof,

    #[error("expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("unknown function '{name}'")]
    FunctionUnknown { name: String },

    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("unresolved path '{path}'")]
    UnresolvedPath { path: String },

    #[error("undefined variable '{path}'")]
    UndefinedVariable { path: String },

    #[error("step '{step}' has no field '{field}'")]
    UndefinedStepField { step: String, field: String },

    #[error("expression evaluation failed: {message}")]
    ExpressionEval { message: String },

    #[error("cannot coerce {from} to {to}")]
    Coercion { from: String, to: String },
}

/// Errors raised while executing a step (agent, script, container,
/// sub-workflow, or built-in action).
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("step '{step}' timed out after {timeout_secs}s")]
    Timeout { step: String, timeout_secs: u64 },

    #[error("step '{step}' was cancelled")]
    Cancelled { step: String },

    #[error("step '{step}' exited with status {status}: {stderr}")]
    NonZeroExit {
        step: String,
        status: i32,
        stderr: String,
    },

    #[error("step '{step}' required runtime '{runtime}' which is not configured")]
    MissingRuntime { step: String, runtime: String },

    #[error("agent '{agent}' exceeded its maximum turn budget ({max_turns})")]
    MaxTurnsExceeded { agent: String, max_turns: u32 },

    #[error("step '{step}' produced output that did not match its declared schema: {reason}")]
    OutputSchemaMismatch { step: String, reason: String },

    #[error("step '{step}' deadlocked: no ready steps remain but {remaining} step(s) are unresolved")]
    Deadlock { step: String, remaining: usize },

    #[error("provider call failed: {message}")]
    Provider { message: String },

    #[error("tool '{tool}' invocation failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("step '{step}' template rendering failed: {message}")]
    TemplateRender { step: String, message: String },

    #[error("step '{step}' references unsupported block reference '{reference}'")]
    UnsupportedReference { step: String, reference: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, LacquerError>;
