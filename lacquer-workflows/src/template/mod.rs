//! ABOUTME: Template engine (C4) - lexing/parsing/rendering `{{ expr }}` against a live Namespace
//! ABOUTME: Public surface: `extract_spans` (used by the validator) and `render` (used at runtime)

mod ast;
mod functions;
mod lexer;
mod namespace;
mod parser;
mod render;

pub use ast::Expr;
pub use namespace::Namespace;
pub(crate) use render::eval;

use lacquer_core::document::Value;
use lacquer_core::error::TemplateError;

/// One `{{ ... }}` occurrence found in a field's raw text.
#[derive(Debug, Clone)]
pub struct Span {
    pub source: String,
    pub expr: Expr,
    /// True when the span is the field's entire (trimmed) content, meaning
    /// the rendered value keeps its native tag instead of being stringified.
    pub is_whole_field: bool,
}

/// Find every `{{ ... }}` occurrence in `text` and parse its body. Used both
/// by the validator (to build the dependency graph and check variable
/// scopes without a `RunContext`) and internally by `render`.
pub fn extract_spans(text: &str) -> Result<Vec<Span>, TemplateError> {
    let mut spans = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    let trimmed = text.trim();

    while i < bytes.len() {
        let Some(open) = text[i..].find("{{") else { break };
        let start = i + open;
        let Some(close_rel) = text[start + 2..].find("}}") else {
            return Err(TemplateError::UnexpectedEof);
        };
        let close = start + 2 + close_rel;
        let body = &text[start + 2..close];
        let expr = parser::parse(body)?;
        let source = text[start..close + 2].to_string();
        let is_whole_field = trimmed == source;
        spans.push(Span { source, expr, is_whole_field });
        i = close + 2;
    }

    Ok(spans)
}

/// Render `text` against `ns`. A field whose entire trimmed content is a
/// single `{{ expr }}` yields that expression's native `Value`; any other
/// interpolation (including multiple spans, or a span plus surrounding
/// text) coerces every span to its string form and returns `Value::String`.
pub fn render(text: &str, ns: &Namespace) -> Result<Value, TemplateError> {
    let spans = extract_spans(text)?;
    if spans.is_empty() {
        return Ok(Value::String(text.to_string()));
    }
    if spans.len() == 1 && spans[0].is_whole_field {
        return render::eval(&spans[0].expr, ns);
    }

    let mut out = String::new();
    let mut rest = text;
    for span in &spans {
        let Some(pos) = rest.find(span.source.as_str()) else {
            continue;
        };
        out.push_str(&rest[..pos]);
        let value = render::eval(&span.expr, ns)?;
        out.push_str(&value.to_template_string());
        rest = &rest[pos + span.source.len()..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

/// Collect every `steps.<id>` reference inside an expression (recursively
/// through calls/operators), used by the scheduler to build `deps[stepId]`.
#[must_use]
pub fn step_refs(expr: &Expr) -> Vec<String> {
    let mut refs = Vec::new();
    collect_step_refs(expr, &mut refs);
    refs
}

fn collect_step_refs(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Path(segments) => {
            if segments.first().map(String::as_str) == Some("steps") {
                if let Some(step_id) = segments.get(1) {
                    out.push(step_id.clone());
                }
            }
        }
        Expr::Literal(_) => {}
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_step_refs(a, out)),
        Expr::Unary { expr, .. } => collect_step_refs(expr, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_step_refs(lhs, out);
            collect_step_refs(rhs, out);
        }
        Expr::Ternary { cond, if_true, if_false } => {
            collect_step_refs(cond, out);
            collect_step_refs(if_true, out);
            collect_step_refs(if_false, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use lacquer_core::document::WorkflowDocument;
    use std::collections::BTreeMap;

    fn doc() -> WorkflowDocument {
        WorkflowDocument {
            version: "1.0".into(),
            metadata: Default::default(),
            inputs: BTreeMap::new(),
            state: BTreeMap::new(),
            agents: BTreeMap::new(),
            requirements: Default::default(),
            steps: Vec::new(),
            outputs: BTreeMap::new(),
            source_map: Default::default(),
        }
    }

    #[test]
    fn whole_field_expression_keeps_native_type() {
        let document = doc();
        let mut inputs = BTreeMap::new();
        inputs.insert("dry_run".to_string(), Value::Bool(true));
        let run = RunContext::new(inputs, BTreeMap::new());
        let ns = Namespace::new(&document, &run);
        let value = render("{{ inputs.dry_run }}", &ns).unwrap();
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn interpolated_text_coerces_to_string() {
        let document = doc();
        let mut inputs = BTreeMap::new();
        inputs.insert("name".to_string(), Value::String("ada".into()));
        let run = RunContext::new(inputs, BTreeMap::new());
        let ns = Namespace::new(&document, &run);
        let value = render("hello {{ inputs.name }}!", &ns).unwrap();
        assert_eq!(value, Value::String("hello ada!".into()));
    }

    #[test]
    fn unbalanced_braces_is_unexpected_eof() {
        let err = extract_spans("{{ inputs.topic").unwrap_err();
        assert!(matches!(err, TemplateError::UnexpectedEof));
    }

    #[test]
    fn step_refs_collects_from_nested_expression() {
        let expr = parser::parse("steps.a.output == steps.b.output").unwrap();
        let mut refs = step_refs(&expr);
        refs.sort();
        assert_eq!(refs, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn idempotent_rerender_is_identical() {
        let document = doc();
        let mut inputs = BTreeMap::new();
        inputs.insert("x".to_string(), Value::Int(3));
        let run = RunContext::new(inputs, BTreeMap::new());
        let ns = Namespace::new(&document, &run);
        let a = render("{{ x }}".replace('x', "inputs.x").as_str(), &ns).unwrap();
        let b = render("{{ inputs.x }}", &ns).unwrap();
        assert_eq!(a, b);
    }
}
