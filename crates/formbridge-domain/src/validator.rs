//! Schema-driven validator per §4.C.
//!
//! Pure: no I/O, no clock. Produces a flat list of field-path-keyed errors
//! from a fixed, stable set of lowercase error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::intake::{FieldSchema, FieldType};

/// A single field validation error per §4.C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: ErrorCode,
}

/// Stable lowercase error codes per §4.C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Required,
    InvalidType,
    InvalidFormat,
    InvalidValue,
    TooLong,
    TooShort,
    FileRequired,
    FileTooLarge,
    FileWrongType,
    Custom,
}

/// Validation mode per §4.C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Fails on any absent `required` field.
    Full,
    /// All fields are optional; constraints are still enforced on
    /// whichever fields are present.
    Partial,
}

/// Validate a candidate field map against a schema.
pub fn validate(
    schema: &FieldSchema,
    fields: &HashMap<String, Value>,
    mode: ValidationMode,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_object(schema, fields, "", mode, &mut errors);
    errors
}

fn validate_object(
    schema: &FieldSchema,
    fields: &HashMap<String, Value>,
    path_prefix: &str,
    mode: ValidationMode,
    errors: &mut Vec<FieldError>,
) {
    if mode == ValidationMode::Full {
        for required in &schema.required {
            if !fields.contains_key(required) {
                errors.push(FieldError {
                    field: join_path(path_prefix, required),
                    message: format!("{required} is required"),
                    code: ErrorCode::Required,
                });
            }
        }
    }

    for (name, field_schema) in &schema.properties {
        if let Some(value) = fields.get(name) {
            let path = join_path(path_prefix, name);
            validate_value(field_schema, value, &path, errors);
        }
    }
}

fn validate_value(schema: &FieldSchema, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    match schema.field_type {
        FieldType::String => validate_string(schema, value, path, errors),
        FieldType::Number | FieldType::Integer => validate_number(schema, value, path, errors),
        FieldType::Boolean => {
            if !value.is_boolean() {
                errors.push(type_error(path, "boolean"));
            }
        }
        FieldType::Object => validate_nested_object(schema, value, path, errors),
        FieldType::Array => validate_array(schema, value, path, errors),
        FieldType::File => validate_file(schema, value, path, errors),
    }
}

fn validate_string(schema: &FieldSchema, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    let Some(s) = value.as_str() else {
        errors.push(type_error(path, "string"));
        return;
    };

    if let Some(max) = schema.max_length {
        if s.chars().count() > max {
            errors.push(FieldError {
                field: path.to_string(),
                message: format!("must be at most {max} characters"),
                code: ErrorCode::TooLong,
            });
        }
    }
    if let Some(min) = schema.min_length {
        if s.chars().count() < min {
            errors.push(FieldError {
                field: path.to_string(),
                message: format!("must be at least {min} characters"),
                code: ErrorCode::TooShort,
            });
        }
    }
    if let Some(pattern) = &schema.pattern {
        match regex::Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => errors.push(FieldError {
                field: path.to_string(),
                message: format!("does not match pattern {pattern}"),
                code: ErrorCode::InvalidFormat,
            }),
            _ => {}
        }
    }
    if !schema.r#enum.is_empty() && !schema.r#enum.iter().any(|v| v == value) {
        errors.push(FieldError {
            field: path.to_string(),
            message: "not one of the allowed values".to_string(),
            code: ErrorCode::InvalidValue,
        });
    }
    if let Some(format) = &schema.format {
        if !matches_format(format, s) {
            errors.push(FieldError {
                field: path.to_string(),
                message: format!("does not match format {format}"),
                code: ErrorCode::InvalidFormat,
            });
        }
    }
}

fn matches_format(format: &str, value: &str) -> bool {
    match format {
        "email" => value.contains('@') && value.split('@').count() == 2,
        "uri" | "url" => value.contains("://"),
        "date" => value.len() == 10 && value.as_bytes().get(4) == Some(&b'-'),
        "date-time" => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        _ => true,
    }
}

fn validate_number(schema: &FieldSchema, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    let Some(n) = value.as_f64() else {
        errors.push(type_error(path, "number"));
        return;
    };
    if schema.field_type == FieldType::Integer && value.as_i64().is_none() && value.as_u64().is_none() {
        errors.push(type_error(path, "integer"));
        return;
    }
    if let Some(min) = schema.minimum {
        if n < min {
            errors.push(FieldError {
                field: path.to_string(),
                message: format!("must be >= {min}"),
                code: ErrorCode::InvalidValue,
            });
        }
    }
    if let Some(max) = schema.maximum {
        if n > max {
            errors.push(FieldError {
                field: path.to_string(),
                message: format!("must be <= {max}"),
                code: ErrorCode::InvalidValue,
            });
        }
    }
}

fn validate_nested_object(
    schema: &FieldSchema,
    value: &Value,
    path: &str,
    errors: &mut Vec<FieldError>,
) {
    let Some(obj) = value.as_object() else {
        errors.push(type_error(path, "object"));
        return;
    };
    let map: HashMap<String, Value> = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for required in &schema.required {
        if !map.contains_key(required) {
            errors.push(FieldError {
                field: join_path(path, required),
                message: format!("{required} is required"),
                code: ErrorCode::Required,
            });
        }
    }
    for (name, field_schema) in &schema.properties {
        if let Some(v) = map.get(name) {
            let child_path = join_path(path, name);
            validate_value(field_schema, v, &child_path, errors);
        }
    }
}

fn validate_array(schema: &FieldSchema, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    let Some(items) = value.as_array() else {
        errors.push(type_error(path, "array"));
        return;
    };
    if let Some(item_schema) = &schema.items {
        for (index, item) in items.iter().enumerate() {
            let item_path = format!("{path}[{index}]");
            validate_value(item_schema, item, &item_path, errors);
        }
    }
}

fn validate_file(schema: &FieldSchema, value: &Value, path: &str, errors: &mut Vec<FieldError>) {
    let Some(obj) = value.as_object() else {
        errors.push(FieldError {
            field: path.to_string(),
            message: "file reference is required".to_string(),
            code: ErrorCode::FileRequired,
        });
        return;
    };

    if let Some(max_size) = schema.max_size {
        if let Some(size) = obj.get("sizeBytes").and_then(Value::as_u64) {
            if size > max_size {
                errors.push(FieldError {
                    field: path.to_string(),
                    message: format!("file exceeds maximum size of {max_size} bytes"),
                    code: ErrorCode::FileTooLarge,
                });
            }
        }
    }

    if !schema.allowed_types.is_empty() {
        if let Some(mime) = obj.get("mimeType").and_then(Value::as_str) {
            if !schema.allowed_types.iter().any(|t| t == mime) {
                errors.push(FieldError {
                    field: path.to_string(),
                    message: format!("file type {mime} is not permitted"),
                    code: ErrorCode::FileWrongType,
                });
            }
        }
    }
}

fn type_error(path: &str, expected: &str) -> FieldError {
    FieldError {
        field: path.to_string(),
        message: format!("expected {expected}"),
        code: ErrorCode::InvalidType,
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
