//! ABOUTME: AST-shape validation layer - identifier shapes, duplicate ids, `uses:` reference format
//! ABOUTME: Runs after structural checks, still without resolving cross-step template references

use crate::report::{Category, Issue, Report};
use lacquer_core::document::{ActionStepDef, StepDef, StepKind, WorkflowDocument};
use lacquer_utils::is_valid_identifier;
use std::collections::HashSet;

pub fn check(doc: &WorkflowDocument, report: &mut Report) {
    for name in doc.agents.keys() {
        if !is_valid_identifier(name) {
            report.push(Issue::error(
                Category::Semantic,
                "InvalidIdentifier",
                format!("agents.{name}"),
                format!("agent name '{name}' is not a valid identifier"),
            ));
        }
    }
    for (name, agent) in &doc.agents {
        if let Some(uses) = &agent.uses {
            check_uses_format(uses, &format!("agents.{name}.uses"), report);
        }
    }

    check_steps_scope(&doc.steps, "steps", report);
}

/// Recursively checks one scope's step list: id shape, duplicates within the
/// scope, and per-kind shape rules. A `while` step's own `steps:` is a
/// separate scope (its ids only need to be unique among themselves).
fn check_steps_scope(steps: &[StepDef], path: &str, report: &mut Report) {
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, step) in steps.iter().enumerate() {
        let step_path = format!("{path}[{i}]");

        if !is_valid_identifier(&step.id) {
            report.push(Issue::error(
                Category::Semantic,
                "InvalidIdentifier",
                format!("{step_path}.id"),
                format!("step id '{}' is not a valid identifier", step.id),
            ));
        } else if !seen.insert(step.id.as_str()) {
            report.push(Issue::error(
                Category::Semantic,
                "DuplicateStepId",
                format!("{step_path}.id"),
                format!("duplicate step id '{}' within the same scope", step.id),
            ));
        }

        check_step_kind(step, &step_path, report);
        check_steps_scope(&step.steps, &format!("{step_path}.steps"), report);
    }
}

fn check_step_kind(step: &StepDef, path: &str, report: &mut Report) {
    match &step.kind {
        StepKind::Block(block) => check_uses_format(&block.uses, &format!("{path}.uses"), report),
        StepKind::Action(ActionStepDef::UpdateState { updates }) => {
            if updates.is_empty() {
                report.push(Issue::error(
                    Category::Semantic,
                    "EmptyUpdates",
                    format!("{path}.updates"),
                    "action: update_state requires at least one entry in 'updates'",
                ));
            }
        }
        StepKind::Agent(_) | StepKind::Script(_) | StepKind::Container(_) | StepKind::Action(_) => {}
    }
}

/// `uses:` accepts `lacquer/<name>[@vX.Y]`, `github.com/<owner>/<repo>[@ref]`,
/// or a relative path `./...`.
fn check_uses_format(uses: &str, path: &str, report: &mut Report) {
    let (body, _version) = uses.split_once('@').unwrap_or((uses, ""));
    let valid = uses.starts_with("./")
        || body.starts_with("lacquer/")
        || body.starts_with("github.com/");
    if !valid {
        report.push(Issue::error(
            Category::Semantic,
            "InvalidReference",
            path,
            format!(
                "'{uses}' is not a recognized reference format (expected lacquer/<name>, github.com/<owner>/<repo>, or ./<path>)"
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse as parse_doc;

    #[test]
    fn rejects_duplicate_step_ids_in_same_scope() {
        let src = r#"
version: "1.0"
steps:
  - id: fetch
    run: "echo hi"
  - id: fetch
    run: "echo bye"
"#;
        let doc = parse_doc(src).unwrap();
        let mut report = Report::new();
        check(&doc, &mut report);
        assert!(report.issues.iter().any(|i| i.code == "DuplicateStepId"));
    }

    #[test]
    fn rejects_malformed_uses_reference() {
        let src = r#"
version: "1.0"
steps:
  - id: sub
    uses: "not-a-valid-ref"
"#;
        let doc = parse_doc(src).unwrap();
        let mut report = Report::new();
        check(&doc, &mut report);
        assert!(report.issues.iter().any(|i| i.code == "InvalidReference"));
    }

    #[test]
    fn rejects_empty_update_state() {
        let src = r#"
version: "1.0"
steps:
  - id: bump
    action: update_state
    updates: {}
"#;
        let doc = parse_doc(src).unwrap();
        let mut report = Report::new();
        check(&doc, &mut report);
        assert!(report.issues.iter().any(|i| i.code == "EmptyUpdates"));
    }

    #[test]
    fn while_sub_steps_are_an_independent_id_scope() {
        let src = r#"
version: "1.0"
steps:
  - id: outer
    while: "true"
    steps:
      - id: outer
        run: "echo nested-shares-name-with-parent-ok"
"#;
        // a nested step may legitimately reuse an id already used by an
        // ancestor scope; only siblings within the same scope collide.
        let doc = parse_doc(src);
        assert!(doc.is_ok());
    }
}
