//! ABOUTME: Semantic validation layer - dependency graph, cycle detection, forward references,
//! ABOUTME: and variable-scope resolution, all built on `template::{extract_spans, step_refs}`

use crate::report::{Category, Issue, Report};
use crate::template::{self, Namespace};
use lacquer_core::document::{ActionStepDef, StepDef, StepKind, Value, WorkflowDocument};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A step flattened out of its nesting, in declaration order, together with
/// the scope path used for diagnostics.
struct FlatStep<'a> {
    step: &'a StepDef,
    path: String,
}

pub fn check(doc: &WorkflowDocument, report: &mut Report) {
    let flat = flatten(&doc.steps, "steps");
    let index_of: HashMap<&str, usize> =
        flat.iter().enumerate().map(|(i, f)| (f.step.id.as_str(), i)).collect();

    let deps = build_dependency_graph(&flat, report);
    check_forward_references(&flat, &index_of, &deps, report);
    check_cycles(&flat, &deps, report);
    check_scopes(doc, &flat, report);
    check_workflow_outputs(doc, &index_of, report);
}

fn flatten<'a>(steps: &'a [StepDef], path: &str) -> Vec<FlatStep<'a>> {
    let mut out = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        let step_path = format!("{path}[{i}]");
        out.push(FlatStep { step, path: step_path.clone() });
        out.extend(flatten(&step.steps, &format!("{step_path}.steps")));
    }
    out
}

/// Every template string a step can reference another step's output from:
/// `prompt`, `condition`, `skip_if`, `while`, values in `with`, values in
/// `updates` (both the dedicated `update_state` action and the legacy
/// top-level field), and container `command` entries.
pub(crate) fn step_template_strings(step: &StepDef) -> Vec<String> {
    let mut out = Vec::new();
    match &step.kind {
        StepKind::Agent(a) => out.push(a.prompt.clone()),
        StepKind::Script(s) => out.push(s.run.clone()),
        StepKind::Container(c) => out.extend(c.command.iter().cloned()),
        StepKind::Block(_) => {}
        StepKind::Action(ActionStepDef::HumanInput { prompt }) => {
            if let Some(p) = prompt {
                out.push(p.clone());
            }
        }
        StepKind::Action(ActionStepDef::UpdateState { updates }) => {
            collect_value_strings(&Value::Map(updates.clone()), &mut out);
        }
    }
    if let Some(c) = &step.condition {
        out.push(c.clone());
    }
    if let Some(s) = &step.skip_if {
        out.push(s.clone());
    }
    if let Some(w) = &step.r#while {
        out.push(w.clone());
    }
    for value in step.with.values() {
        collect_value_strings(value, &mut out);
    }
    for value in step.updates.values() {
        collect_value_strings(value, &mut out);
    }
    out
}

fn collect_value_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::List(items) => items.iter().for_each(|v| collect_value_strings(v, out)),
        Value::Map(entries) => entries.values().for_each(|v| collect_value_strings(v, out)),
        _ => {}
    }
}

/// `deps[step_id]` = set of other step ids referenced from that step's
/// template strings. Malformed template syntax is reported here (as a
/// `TemplateSyntax` issue) rather than surfaced as a parser panic later.
fn build_dependency_graph(flat: &[FlatStep], report: &mut Report) -> BTreeMap<String, HashSet<String>> {
    let mut deps: BTreeMap<String, HashSet<String>> = BTreeMap::new();
    for entry in flat {
        let mut refs = HashSet::new();
        for text in step_template_strings(entry.step) {
            match template::extract_spans(&text) {
                Ok(spans) => {
                    for span in spans {
                        for step_id in template::step_refs(&span.expr) {
                            if step_id != entry.step.id {
                                refs.insert(step_id);
                            }
                        }
                    }
                }
                Err(err) => {
                    report.push(Issue::error(
                        Category::Semantic,
                        "TemplateSyntax",
                        format!("{}.{{template}}", entry.path),
                        format!("malformed template expression: {err}"),
                    ));
                }
            }
        }
        deps.insert(entry.step.id.clone(), refs);
    }
    deps
}

fn check_forward_references(
    flat: &[FlatStep],
    index_of: &HashMap<&str, usize>,
    deps: &BTreeMap<String, HashSet<String>>,
    report: &mut Report,
) {
    for (i, entry) in flat.iter().enumerate() {
        let Some(refs) = deps.get(entry.step.id.as_str()) else { continue };
        for referenced in refs {
            match index_of.get(referenced.as_str()) {
                None => {
                    report.push(Issue::error(
                        Category::Semantic,
                        "UndefinedStepReference",
                        entry.path.clone(),
                        format!("step '{}' references undefined step '{referenced}'", entry.step.id),
                    ));
                }
                Some(&ref_index) if ref_index >= i => {
                    report.push(Issue::error(
                        Category::Semantic,
                        "ForwardReference",
                        entry.path.clone(),
                        format!(
                            "step '{}' references step '{referenced}' which has not run yet",
                            entry.step.id
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
    }
}

fn check_cycles(flat: &[FlatStep], deps: &BTreeMap<String, HashSet<String>>, report: &mut Report) {
    #[derive(PartialEq, Clone, Copy)]
    enum Color {
        White,
        Gray,
        Black,
    }
    let mut color: HashMap<&str, Color> =
        flat.iter().map(|f| (f.step.id.as_str(), Color::White)).collect();
    let mut cycle: Option<Vec<String>> = None;

    fn visit<'a>(
        node: &'a str,
        deps: &'a BTreeMap<String, HashSet<String>>,
        color: &mut HashMap<&'a str, Color>,
        stack: &mut Vec<&'a str>,
        cycle: &mut Option<Vec<String>>,
    ) {
        if cycle.is_some() {
            return;
        }
        color.insert(node, Color::Gray);
        stack.push(node);
        if let Some(refs) = deps.get(node) {
            for next in refs {
                match color.get(next.as_str()) {
                    Some(Color::Gray) => {
                        // `next` is still on the recursion stack: the cycle
                        // is the stack suffix from `next` back to `node`,
                        // closed by the edge `node -> next`.
                        let start = stack.iter().position(|id| *id == next.as_str()).unwrap_or(0);
                        let mut nodes: Vec<String> = stack[start..].iter().map(|s| (*s).to_string()).collect();
                        nodes.push(next.clone());
                        *cycle = Some(nodes);
                        return;
                    }
                    Some(Color::White) | None => {
                        visit(next, deps, color, stack, cycle);
                        if cycle.is_some() {
                            return;
                        }
                    }
                    Some(Color::Black) => {}
                }
            }
        }
        stack.pop();
        color.insert(node, Color::Black);
    }

    for entry in flat {
        if color.get(entry.step.id.as_str()) == Some(&Color::White) {
            let mut stack = Vec::new();
            visit(&entry.step.id, deps, &mut color, &mut stack, &mut cycle);
        }
        if let Some(nodes) = &cycle {
            report.push(Issue::error(
                Category::Semantic,
                "CircularDependency",
                "steps",
                format!("circular dependency among steps: {}", nodes.join(" -> ")),
            ));
            return;
        }
    }
}

/// Re-render every step's template strings against an empty `RunContext` to
/// surface `UndefinedVariable`/`UndefinedStepField` errors at compile time,
/// skipping `steps.*` references to steps that legitimately haven't run yet
/// in this static pass (those are covered by `check_forward_references`).
fn check_scopes(doc: &WorkflowDocument, flat: &[FlatStep], report: &mut Report) {
    let run = crate::context::RunContext::new(BTreeMap::new(), BTreeMap::new());
    for entry in flat {
        run.register_step(&entry.step.id);
    }
    let ns = Namespace::new(doc, &run);

    for entry in flat {
        for text in step_template_strings(entry.step) {
            let Ok(spans) = template::extract_spans(&text) else { continue };
            for span in spans {
                if let Err(err) = template::eval(&span.expr, &ns) {
                    // unresolved steps (not yet run) are expected at this
                    // static pass and are reported separately.
                    let is_pending_step = matches!(
                        &err,
                        lacquer_core::error::TemplateError::UndefinedStepField { .. }
                    );
                    if !is_pending_step {
                        report.push(Issue::error(
                            Category::Semantic,
                            "UnresolvedReference",
                            entry.path.clone(),
                            format!("'{}': {err}", span.source),
                        ));
                    }
                }
            }
        }
    }
}

fn check_workflow_outputs(
    doc: &WorkflowDocument,
    index_of: &HashMap<&str, usize>,
    report: &mut Report,
) {
    for (name, text) in &doc.outputs {
        let Ok(spans) = template::extract_spans(text) else {
            report.push(Issue::error(
                Category::Semantic,
                "TemplateSyntax",
                format!("outputs.{name}"),
                "malformed template expression",
            ));
            continue;
        };
        for span in spans {
            for step_id in template::step_refs(&span.expr) {
                if !index_of.contains_key(step_id.as_str()) {
                    report.push(Issue::error(
                        Category::Semantic,
                        "UndefinedStepReference",
                        format!("outputs.{name}"),
                        format!("output '{name}' references undefined step '{step_id}'"),
                    ));
                }
            }
        }
    }
}
