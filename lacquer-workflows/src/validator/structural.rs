//! ABOUTME: Structural validation layer - required fields, enums, numeric ranges, exclusivity
//! ABOUTME: Runs first but all three layers' errors are collected before compilation aborts

use crate::report::{Category, Issue, Report};
use lacquer_core::document::{StepDef, WorkflowDocument};

pub fn check(doc: &WorkflowDocument, report: &mut Report) {
    check_version(doc, report);
    check_agents(doc, report);
    check_inputs(doc, report);
    for (i, step) in doc.steps.iter().enumerate() {
        check_step(step, &format!("steps[{i}]"), report);
    }
}

fn check_version(doc: &WorkflowDocument, report: &mut Report) {
    if doc.version != "1.0" {
        report.push(Issue::error(
            Category::Schema,
            "MissingField",
            "version",
            format!("workflow version must be exactly \"1.0\", got \"{}\"", doc.version),
        ));
    }
}

fn check_agents(doc: &WorkflowDocument, report: &mut Report) {
    for (name, agent) in &doc.agents {
        let path = format!("agents.{name}");
        if agent.uses.is_some() && (agent.model.is_some() || agent.provider.is_some()) {
            report.push(Issue::error(
                Category::Schema,
                "ExclusivityViolation",
                path.clone(),
                "an agent cannot declare both 'uses' and 'model'/'provider'",
            ));
        }
        if let Some(t) = agent.temperature {
            if !(0.0..=2.0).contains(&t) {
                report.push(Issue::error(
                    Category::Schema,
                    "NumericRange",
                    format!("{path}.temperature"),
                    format!("temperature must be within 0..=2, got {t}"),
                ));
            }
        }
        if let Some(p) = agent.top_p {
            if !(0.0..=1.0).contains(&p) {
                report.push(Issue::error(
                    Category::Schema,
                    "NumericRange",
                    format!("{path}.top_p"),
                    format!("top_p must be within 0..=1, got {p}"),
                ));
            }
        }
        if let Some(mt) = agent.max_tokens {
            if mt < 1 {
                report.push(Issue::error(
                    Category::Schema,
                    "NumericRange",
                    format!("{path}.max_tokens"),
                    "max_tokens must be >= 1",
                ));
            }
        }
    }
}

fn check_inputs(doc: &WorkflowDocument, report: &mut Report) {
    for (name, input) in &doc.inputs {
        let path = format!("inputs.{name}");
        if let (Some(min), Some(max)) = (input.minimum, input.maximum) {
            if min > max {
                report.push(Issue::error(
                    Category::Schema,
                    "NumericRange",
                    path,
                    format!("minimum ({min}) must be <= maximum ({max})"),
                ));
            }
        }
    }
}

fn check_step(step: &StepDef, path: &str, report: &mut Report) {
    if let Some(retry) = &step.retry {
        if retry.max_attempts < 1 {
            report.push(Issue::error(
                Category::Schema,
                "NumericRange",
                format!("{path}.retry.max_attempts"),
                "retry.max_attempts must be >= 1",
            ));
        }
    }
    for (i, nested) in step.steps.iter().enumerate() {
        check_step(nested, &format!("{path}.steps[{i}]"), report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse as parse_doc;

    #[test]
    fn rejects_agent_with_both_uses_and_model() {
        let src = r#"
version: "1.0"
agents:
  researcher:
    uses: "lacquer/researcher@v1.0"
    model: "gpt-4"
steps:
  - id: s1
    agent: researcher
    prompt: "hi"
"#;
        let doc = parse_doc(src).unwrap();
        let mut report = Report::new();
        check(&doc, &mut report);
        assert!(report.issues.iter().any(|i| i.code == "ExclusivityViolation"));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let src = r#"
version: "1.0"
agents:
  researcher:
    model: "gpt-4"
    temperature: 3.5
steps:
  - id: s1
    agent: researcher
    prompt: "hi"
"#;
        let doc = parse_doc(src).unwrap();
        let mut report = Report::new();
        check(&doc, &mut report);
        assert!(report.issues.iter().any(|i| i.code == "NumericRange"));
    }
}
