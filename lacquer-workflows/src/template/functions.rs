//! ABOUTME: Whitelisted function calls available inside `{{ }}` expressions
//! ABOUTME: now/default/upper/lower/trim/len/contains/join - calling anything else is FunctionUnknown

use lacquer_core::document::Value;
use lacquer_core::error::TemplateError;

pub fn call(name: &str, args: &[Value]) -> Result<Value, TemplateError> {
    match name {
        "now" => {
            require_arity(name, args, 0)?;
            Ok(Value::String(chrono::Utc::now().to_rfc3339()))
        }
        "default" => {
            require_arity(name, args, 2)?;
            Ok(if matches!(args[0], Value::Null) {
                args[1].clone()
            } else {
                args[0].clone()
            })
        }
        "upper" => {
            require_arity(name, args, 1)?;
            Ok(Value::String(as_str(&args[0])?.to_uppercase()))
        }
        "lower" => {
            require_arity(name, args, 1)?;
            Ok(Value::String(as_str(&args[0])?.to_lowercase()))
        }
        "trim" => {
            require_arity(name, args, 1)?;
            Ok(Value::String(as_str(&args[0])?.trim().to_string()))
        }
        "len" => {
            require_arity(name, args, 1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(TemplateError::Coercion {
                        from: other.type_name().to_string(),
                        to: "sized collection".into(),
                    })
                }
            };
            Ok(Value::Int(len as i64))
        }
        "contains" => {
            require_arity(name, args, 2)?;
            let found = match &args[0] {
                Value::String(haystack) => haystack.contains(&as_str(&args[1])?),
                Value::List(items) => items.contains(&args[1]),
                other => {
                    return Err(TemplateError::Coercion {
                        from: other.type_name().to_string(),
                        to: "string or list".into(),
                    })
                }
            };
            Ok(Value::Bool(found))
        }
        "join" => {
            require_arity(name, args, 2)?;
            let Value::List(items) = &args[0] else {
                return Err(TemplateError::Coercion {
                    from: args[0].type_name().to_string(),
                    to: "list".into(),
                });
            };
            let sep = as_str(&args[1])?;
            let joined = items
                .iter()
                .map(Value::to_template_string)
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Value::String(joined))
        }
        other => Err(TemplateError::FunctionUnknown { name: other.to_string() }),
    }
}

fn require_arity(name: &str, args: &[Value], expected: usize) -> Result<(), TemplateError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(TemplateError::ArityMismatch {
            name: name.to_string(),
            expected,
            got: args.len(),
        })
    }
}

fn as_str(value: &Value) -> Result<String, TemplateError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_template_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_returns_fallback_only_when_null() {
        assert_eq!(
            call("default", &[Value::Null, Value::String("x".into())]).unwrap(),
            Value::String("x".into())
        );
        assert_eq!(
            call("default", &[Value::Int(1), Value::String("x".into())]).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = call("mystery", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::FunctionUnknown { .. }));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let err = call("upper", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::ArityMismatch { .. }));
    }

    #[test]
    fn join_renders_list_elements() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = call("join", &[list, Value::String(",".into())]).unwrap();
        assert_eq!(result, Value::String("1,2,3".into()));
    }
}
