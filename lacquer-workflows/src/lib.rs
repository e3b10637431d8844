//! ABOUTME: Static compilation and runtime for lacquer workflow documents (engine core, C2-C9)
//! ABOUTME: `compile` turns YAML source into a validated document; `execute` drives it to completion

pub mod context;
pub mod executor;
pub mod parser;
pub mod report;
pub mod scheduler;
pub mod subworkflow;
pub mod template;
pub mod validator;

pub use context::{RunContext, StepResult, StepStatus, TokenUsage};
pub use executor::container::{ContainerRuntime, LocalProcessContainerRuntime};
pub use report::{Issue, Report, Severity};
pub use scheduler::execute;
pub use subworkflow::EngineSubWorkflowRunner;

use lacquer_core::document::WorkflowDocument;

/// Parse and fully validate a workflow source in one call. Returns the
/// document only when the report has zero error-severity issues; per §4.2,
/// "the runtime refuses to execute a document with `valid=false`" so a
/// caller that only wants to compile (e.g. `lacquer validate`) should call
/// `parser::parse` and `validator::validate` directly to see warnings too.
pub fn compile(source: &str) -> Result<WorkflowDocument, Report> {
    let document = parser::parse(source)?;
    let report = validator::validate(&document);
    if report.valid() {
        Ok(document)
    } else {
        Err(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_rejects_a_cycle() {
        let src = r#"
version: "1.0"
metadata:
  name: cyclic
steps:
  - id: s1
    run: "echo {{ steps.s2.output }}"
  - id: s2
    run: "echo {{ steps.s1.output }}"
"#;
        let report = compile(src).unwrap_err();
        assert!(!report.valid());
        assert!(report.issues.iter().any(|i| i.code == "CircularDependency"));
    }

    #[test]
    fn compile_accepts_a_linear_workflow() {
        let src = r#"
version: "1.0"
metadata:
  name: linear
inputs:
  topic: string
agents:
  researcher:
    model: "gpt-4"
steps:
  - id: fetch
    agent: researcher
    prompt: "research {{ inputs.topic }}"
outputs:
  result: "{{ steps.fetch.response }}"
"#;
        let document = compile(src).unwrap();
        assert_eq!(document.steps.len(), 1);
    }
}
