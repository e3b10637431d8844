//! ABOUTME: Output-schema coercion - turns an agent's raw final text into typed `outputs:` fields
//! ABOUTME: Falls back to the raw text under `response` when no declared schema matches

use lacquer_core::document::{OutputFieldSchema, ParamType, Value};
use std::collections::BTreeMap;

/// Coerce `raw_text` (the agent's last assistant turn) against the step's
/// declared `outputs:` schema. Tries, in order: parsing the whole text as a
/// JSON object and pulling named fields out of it; if there is exactly one
/// declared field, coercing the whole text as that field's scalar type.
/// Fields that cannot be coerced are left out (the raw text is still
/// available to callers under the `response` well-known field).
#[must_use]
pub fn coerce_output(schemas: &BTreeMap<String, OutputFieldSchema>, raw_text: &str) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if schemas.is_empty() {
        return out;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw_text) {
        for (name, schema) in schemas {
            if let Some(json_value) = map.get(name) {
                out.insert(name.clone(), coerce_json(json_value, &schema.param_type));
            }
        }
        if !out.is_empty() {
            return out;
        }
    }

    if schemas.len() == 1 {
        let (name, schema) = schemas.iter().next().expect("len == 1");
        out.insert(name.clone(), coerce_scalar(raw_text, &schema.param_type));
    }

    out
}

fn coerce_scalar(text: &str, param_type: &ParamType) -> Value {
    let trimmed = text.trim();
    match param_type {
        ParamType::Boolean => trimmed
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ParamType::Integer => trimmed
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ParamType::Object | ParamType::Array => serde_json::from_str::<serde_json::Value>(trimmed)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ParamType::String => Value::String(text.to_string()),
    }
}

fn coerce_json(value: &serde_json::Value, param_type: &ParamType) -> Value {
    match (param_type, value) {
        (ParamType::String, serde_json::Value::String(s)) => Value::String(s.clone()),
        (ParamType::String, other) => Value::String(other.to_string()),
        _ => Value::from(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(param_type: ParamType) -> OutputFieldSchema {
        OutputFieldSchema { param_type, description: None }
    }

    #[test]
    fn single_field_boolean_schema_coerces_raw_text() {
        let mut schemas = BTreeMap::new();
        schemas.insert("approved".to_string(), schema(ParamType::Boolean));
        let out = coerce_output(&schemas, "true");
        assert_eq!(out.get("approved"), Some(&Value::Bool(true)));
    }

    #[test]
    fn json_object_text_populates_multiple_declared_fields() {
        let mut schemas = BTreeMap::new();
        schemas.insert("summary".to_string(), schema(ParamType::String));
        schemas.insert("score".to_string(), schema(ParamType::Integer));
        let out = coerce_output(&schemas, r#"{"summary": "ok", "score": 9}"#);
        assert_eq!(out.get("summary"), Some(&Value::String("ok".into())));
        assert_eq!(out.get("score"), Some(&Value::Int(9)));
    }

    #[test]
    fn unparseable_text_against_non_string_schema_falls_back_to_string() {
        let mut schemas = BTreeMap::new();
        schemas.insert("count".to_string(), schema(ParamType::Integer));
        let out = coerce_output(&schemas, "not a number");
        assert_eq!(out.get("count"), Some(&Value::String("not a number".into())));
    }

    #[test]
    fn empty_schema_yields_no_fields() {
        let out = coerce_output(&BTreeMap::new(), "anything");
        assert!(out.is_empty());
    }
}
