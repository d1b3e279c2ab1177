//! Check tool call arguments against a JSON Schema before execution.
//!
//! Covers the subset of JSON Schema that tool definitions use in practice:
//! `type`, `required`, `properties`, `enum` and array `items`, applied
//! recursively. Unknown keywords are ignored.

use serde_json::Value;

/// Validate `args` against `schema`, returning the first violation.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    validate_at("arguments", args, schema)
}

fn validate_at(path: &str, value: &Value, schema: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            return Err(format!(
                "{path}: expected type '{expected}', got {}",
                json_type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(format!("{path}: value {value} is not one of the allowed values"));
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !obj.contains_key(name) {
                    return Err(format!("{path}: missing required field '{name}'"));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, field) in obj {
                if let Some(field_schema) = properties.get(key) {
                    validate_at(&format!("{path}.{key}"), field, field_schema)?;
                }
            }
        }
    }

    if let (Some(items), Some(item_schema)) = (value.as_array(), schema.get("items")) {
        for (idx, item) in items.iter().enumerate() {
            validate_at(&format!("{path}[{idx}]"), item, item_schema)?;
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forecast_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": { "type": "string" },
                "days": { "type": "integer" },
                "units": { "type": "string", "enum": ["metric", "imperial"] },
                "hours": { "type": "array", "items": { "type": "integer" } },
            },
            "required": ["city"],
        })
    }

    #[test]
    fn accepts_valid_arguments_with_extra_fields() {
        let args = json!({ "city": "Oslo", "days": 2, "extra": true });
        assert!(validate_arguments(&args, &forecast_schema()).is_ok());
    }

    #[test]
    fn rejects_non_object_arguments() {
        let err = validate_arguments(&json!("Oslo"), &forecast_schema()).unwrap_err();
        assert!(err.contains("expected type 'object'"));
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = validate_arguments(&json!({ "days": 1 }), &forecast_schema()).unwrap_err();
        assert!(err.contains("missing required field 'city'"));
    }

    #[test]
    fn rejects_wrong_field_type_with_path() {
        let err =
            validate_arguments(&json!({ "city": "Oslo", "days": "two" }), &forecast_schema())
                .unwrap_err();
        assert_eq!(err, "arguments.days: expected type 'integer', got string");
    }

    #[test]
    fn rejects_value_outside_enum() {
        let err =
            validate_arguments(&json!({ "city": "Oslo", "units": "kelvin" }), &forecast_schema())
                .unwrap_err();
        assert!(err.contains("arguments.units"));
    }

    #[test]
    fn validates_array_items() {
        let err =
            validate_arguments(&json!({ "city": "Oslo", "hours": [1, "x"] }), &forecast_schema())
                .unwrap_err();
        assert!(err.starts_with("arguments.hours[1]"));
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_arguments(&Value::Null, &json!({})).is_ok());
    }
}
