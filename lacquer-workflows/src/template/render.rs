//! ABOUTME: AST evaluator - walks an `Expr` against a `Namespace`, producing a `Value`
//! ABOUTME: Operators dispatch on the Value tag per §9's tagged-value-union design note

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::functions;
use super::namespace::Namespace;
use lacquer_core::document::Value;
use lacquer_core::error::TemplateError;

pub fn eval(expr: &Expr, ns: &Namespace) -> Result<Value, TemplateError> {
    match expr {
        Expr::Literal(Literal::Number(n)) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Ok(Value::Int(*n as i64))
            } else {
                Ok(Value::Float(*n))
            }
        }
        Expr::Literal(Literal::Str(s)) => Ok(Value::String(s.clone())),
        Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
        Expr::Path(segments) => ns.resolve(segments),
        Expr::Call { name, args } => {
            let values = args.iter().map(|a| eval(a, ns)).collect::<Result<Vec<_>, _>>()?;
            functions::call(name, &values)
        }
        Expr::Unary { op, expr } => {
            let value = eval(expr, ns)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => as_number(&value).map(|n| numeric_result(-n, &value)),
            }
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, ns),
        Expr::Ternary { cond, if_true, if_false } => {
            if eval(cond, ns)?.is_truthy() {
                eval(if_true, ns)
            } else {
                eval(if_false, ns)
            }
        }
    }
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, ns: &Namespace) -> Result<Value, TemplateError> {
    // `and`/`or` short-circuit on SafeBool truthiness rather than requiring
    // both sides to be booleans.
    if op == BinaryOp::And {
        let l = eval(lhs, ns)?;
        if !l.is_truthy() {
            return Ok(Value::Bool(false));
        }
        return Ok(Value::Bool(eval(rhs, ns)?.is_truthy()));
    }
    if op == BinaryOp::Or {
        let l = eval(lhs, ns)?;
        if l.is_truthy() {
            return Ok(Value::Bool(true));
        }
        return Ok(Value::Bool(eval(rhs, ns)?.is_truthy()));
    }

    let l = eval(lhs, ns)?;
    let r = eval(rhs, ns)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Ge | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Lt => compare(op, &l, &r),
        BinaryOp::Add => arithmetic(op, &l, &r),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(op, &l, &r),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => l == r,
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, TemplateError> {
    let (a, b) = (as_number(l)?, as_number(r)?);
    let result = match op {
        BinaryOp::Ge => a >= b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Lt => a < b,
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, TemplateError> {
    if op == BinaryOp::Add {
        if let (Value::String(a), Value::String(b)) = (l, r) {
            return Ok(Value::String(format!("{a}{b}")));
        }
    }
    let (a, b) = (as_number(l)?, as_number(r)?);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(TemplateError::ExpressionEval { message: "division by zero".into() });
            }
            a / b
        }
        _ => unreachable!(),
    };
    Ok(numeric_result(result, l))
}

fn as_number(value: &Value) -> Result<f64, TemplateError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(TemplateError::Coercion {
            from: other.type_name().to_string(),
            to: "number".into(),
        }),
    }
}

/// Keep integer results integer-tagged when both operands were integral;
/// otherwise produce a float, mirroring how the document model's `Value`
/// tags flow through arithmetic.
fn numeric_result(n: f64, hint: &Value) -> Value {
    if matches!(hint, Value::Int(_)) && n.fract() == 0.0 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use crate::template::parser::parse;
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
    fn evaluates_arithmetic_keeping_int_tag() {
        let document = doc();
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let ns = Namespace::new(&document, &run);
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(eval(&expr, &ns).unwrap(), Value::Int(7));
    }

    #[test]
    fn and_short_circuits_without_evaluating_rhs() {
        let document = doc();
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let ns = Namespace::new(&document, &run);
        // `inputs.missing` would error if evaluated; short-circuit avoids it.
        let expr = parse("false and inputs.missing").unwrap();
        assert_eq!(eval(&expr, &ns).unwrap(), Value::Bool(false));
    }

    #[test]
    fn division_by_zero_is_expression_eval_error() {
        let document = doc();
        let run = RunContext::new(BTreeMap::new(), BTreeMap::new());
        let ns = Namespace::new(&document, &run);
        let expr = parse("1 / 0").unwrap();
        assert!(matches!(eval(&expr, &ns), Err(TemplateError::ExpressionEval { .. })));
    }
}
