//! Structural parameter validation against a tool's declared schema.
//!
//! Runs before any tool sees its parameters: required-field presence, then a
//! recursive type check covering primitives, arrays with item schemas, and
//! nested objects with property schemas, plus enum membership. Validation
//! only inspects; it never mutates or performs I/O.

use serde_json::Value;

/// The outcome of validating one parameter object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    fn failed(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Validate `params` against a JSON-Schema-like `schema`.
pub fn validate(schema: &Value, params: &Value) -> Validation {
    let mut errors = Vec::new();
    check_object(schema, params, "", &mut errors);
    if errors.is_empty() {
        Validation::ok()
    } else {
        Validation::failed(errors)
    }
}

fn check_object(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(obj) = value.as_object() else {
        errors.push(format!("{}: expected an object", display_path(path)));
        return;
    };

    // Required fields first, so a missing field reports once rather than as
    // a type mismatch.
    if let Some(required) = schema["required"].as_array() {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !obj.contains_key(field) {
                errors.push(format!(
                    "{}: missing required field '{}'",
                    display_path(path),
                    field
                ));
            }
        }
    }

    if let Some(properties) = schema["properties"].as_object() {
        for (name, prop_schema) in properties {
            if let Some(prop_value) = obj.get(name) {
                let prop_path = join_path(path, name);
                check_value(prop_schema, prop_value, &prop_path, errors);
            }
        }
    }
}

fn check_value(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(expected) = schema["type"].as_str() {
        let matches = match expected {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            errors.push(format!(
                "{}: expected {}, got {}",
                display_path(path),
                expected,
                type_name(value)
            ));
            return;
        }
    }

    if let Some(allowed) = schema["enum"].as_array() {
        if !allowed.contains(value) {
            errors.push(format!(
                "{}: value {} is not one of the allowed values",
                display_path(path),
                value
            ));
            return;
        }
    }

    match value {
        Value::Array(items) => {
            let item_schema = &schema["items"];
            if item_schema.is_object() {
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    check_value(item_schema, item, &item_path, errors);
                }
            }
        }
        Value::Object(_) => {
            if schema["properties"].is_object() || schema["required"].is_array() {
                check_object(schema, value, path, errors);
            }
        }
        _ => {}
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "params"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file_read_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "max_bytes": { "type": "integer" }
            },
            "required": ["path"]
        })
    }

    #[test]
    fn test_valid_params() {
        let result = validate(&file_read_schema(), &json!({"path": "a.txt"}));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_required_field() {
        let result = validate(&file_read_schema(), &json!({}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("missing required field 'path'"));
    }

    #[test]
    fn test_wrong_type() {
        let result = validate(&file_read_schema(), &json!({"path": 42}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("expected string, got number"));
    }

    #[test]
    fn test_integer_type() {
        let schema = file_read_schema();
        assert!(validate(&schema, &json!({"path": "a", "max_bytes": 10})).valid);
        assert!(!validate(&schema, &json!({"path": "a", "max_bytes": 1.5})).valid);
    }

    #[test]
    fn test_enum_membership() {
        let schema = json!({
            "type": "object",
            "properties": {
                "query_type": {
                    "type": "string",
                    "enum": ["cpu", "memory", "disk"]
                }
            },
            "required": ["query_type"]
        });
        assert!(validate(&schema, &json!({"query_type": "cpu"})).valid);
        let result = validate(&schema, &json!({"query_type": "gpu"}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("not one of the allowed values"));
    }

    #[test]
    fn test_array_items() {
        let schema = json!({
            "type": "object",
            "properties": {
                "names": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            }
        });
        assert!(validate(&schema, &json!({"names": ["a", "b"]})).valid);
        let result = validate(&schema, &json!({"names": ["a", 1]}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("names[1]"));
    }

    #[test]
    fn test_nested_object() {
        let schema = json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "object",
                    "properties": {
                        "recursive": { "type": "boolean" }
                    },
                    "required": ["recursive"]
                }
            }
        });
        assert!(validate(&schema, &json!({"options": {"recursive": true}})).valid);

        let result = validate(&schema, &json!({"options": {}}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("missing required field 'recursive'"));

        let result = validate(&schema, &json!({"options": {"recursive": "yes"}}));
        assert!(!result.valid);
        assert!(result.errors[0].contains("options.recursive"));
    }

    #[test]
    fn test_params_must_be_object() {
        let result = validate(&file_read_schema(), &json!("not an object"));
        assert!(!result.valid);
        assert!(result.errors[0].contains("expected an object"));
    }

    #[test]
    fn test_multiple_errors_collected() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "integer" }
            },
            "required": ["a", "b"]
        });
        let result = validate(&schema, &json!({}));
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_extra_fields_ignored() {
        // Unknown fields pass through; only declared properties are checked.
        let result = validate(&file_read_schema(), &json!({"path": "a", "extra": 1}));
        assert!(result.valid);
    }
}
