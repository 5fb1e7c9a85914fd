//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` configuration against a [`Schema`], including
//! the string constraints (allowed values, patterns, lengths) the Partner Center
//! Sell API enforces server-side.
//!
//! # Example
//!
//! ```
//! use partner_center_sell_provider::schema::{Attribute, Schema, StringValidator};
//! use partner_center_sell_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute(
//!     "env",
//!     Attribute::optional_string().with_validator(StringValidator::regexp("^[a-z]+$")),
//! );
//!
//! assert!(validate(&schema, &json!({"env": "current"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"env": "Current"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("env".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
    StringValidator,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed attributes are skipped (the API sets these)
/// - Attribute types must match the schema
/// - String values must satisfy every attached [`StringValidator`]
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Check a single string against a validator.
///
/// Returns a human-readable reason when the value is rejected.
pub fn check_string(validator: &StringValidator, value: &str) -> Result<(), String> {
    match validator {
        StringValidator::AllowedValues { values } => {
            if values.iter().any(|v| v == value) {
                Ok(())
            } else {
                Err(format!(
                    "\"{}\" must be one of: {}",
                    value,
                    values.join(", ")
                ))
            }
        }
        StringValidator::Regexp { pattern } => {
            let re = compiled(pattern).map_err(|e| format!("invalid pattern {}: {}", pattern, e))?;
            if re.is_match(value) {
                Ok(())
            } else {
                Err(format!("\"{}\" must match {}", value, pattern))
            }
        }
        StringValidator::Length { min, max } => {
            let len = value.chars().count();
            if len < *min || len > *max {
                Err(format!(
                    "length must be between {} and {}, got {}",
                    min, max, len
                ))
            } else {
                Ok(())
            }
        }
    }
}

/// Patterns compiled so far, shared by every schema.
fn pattern_cache() -> &'static Mutex<HashMap<String, Regex>> {
    static PATTERNS: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    PATTERNS.get_or_init(Default::default)
}

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = pattern_cache().lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        }
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => {
            if validate_attribute_type(&attr.attr_type, v, path, diagnostics) {
                if let Some(s) = v.as_str() {
                    for validator in &attr.validators {
                        if let Err(reason) = check_string(validator, s) {
                            diagnostics.push(
                                Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                                    .with_detail(reason)
                                    .with_attribute(path),
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Returns true if the value had the expected type.
fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let (ok, expected) = match attr_type {
        AttributeType::String => (value.is_string(), "string"),
        AttributeType::Int64 => (is_int64(value), "int64"),
        AttributeType::Float64 => (value.is_number(), "float64"),
        AttributeType::Bool => (value.is_boolean(), "bool"),
        AttributeType::List(element_type) => {
            let Some(arr) = value.as_array() else {
                diagnostics.push(type_error(path, "list", value));
                return false;
            };
            let before = diagnostics.len();
            for (i, elem) in arr.iter().enumerate() {
                let elem_path = format!("{}.{}", path, i);
                validate_attribute_type(element_type, elem, &elem_path, diagnostics);
            }
            return diagnostics.len() == before;
        }
        AttributeType::Map(value_type) => {
            let Some(obj) = value.as_object() else {
                diagnostics.push(type_error(path, "map", value));
                return false;
            };
            let before = diagnostics.len();
            for (key, val) in obj {
                let key_path = format!("{}.{}", path, key);
                validate_attribute_type(value_type, val, &key_path, diagnostics);
            }
            return diagnostics.len() == before;
        }
    };
    if !ok {
        diagnostics.push(type_error(path, expected, value));
    }
    ok
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail(format!("At least {} block(s) required", nested.min_items))
                        .with_attribute(path),
                );
            }
        }
        (BlockNestingMode::Single, Some(v)) => {
            validate_block(&nested.block, v, path, diagnostics);
        }
        (BlockNestingMode::List, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        (BlockNestingMode::List, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.as_f64()
                    .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
        }
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("company_name", Attribute::required_string());

        assert!(validate(&schema, &json!({"company_name": "Acme"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("company_name".to_string()));

        let diagnostics = validate(&schema, &json!({"company_name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("created_at", Attribute::computed_string());
        assert!(validate(&schema, &json!({"created_at": 5})).is_empty());
    }

    #[test]
    fn test_validate_float_and_int() {
        let schema = Schema::v0()
            .with_attribute("unspsc", Attribute::optional_float64())
            .with_attribute("value", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"unspsc": 43232408.5, "value": 2.0})).is_empty());

        let diagnostics = validate(&schema, &json!({"unspsc": "x", "value": 2.5}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_allowed_values() {
        let schema = Schema::v0().with_attribute(
            "kind",
            Attribute::required_string().with_validator(StringValidator::allowed_values(&[
                "composite",
                "platform_service",
                "service",
            ])),
        );

        assert!(validate(&schema, &json!({"kind": "service"})).is_empty());

        let diagnostics = validate(&schema, &json!({"kind": "plan"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("composite, platform_service, service"));
    }

    #[test]
    fn test_regexp_and_length() {
        let schema = Schema::v0().with_attribute(
            "env",
            Attribute::optional_string()
                .with_validator(StringValidator::regexp("^[a-z]+$"))
                .with_validator(StringValidator::length(1, 4)),
        );

        assert!(validate(&schema, &json!({"env": "test"})).is_empty());
        // Both rules fail
        assert_eq!(validate(&schema, &json!({"env": "Staging"})).len(), 2);
        assert_eq!(validate(&schema, &json!({"env": ""})).len(), 2);
    }

    #[test]
    fn test_validators_skipped_on_type_error() {
        let schema = Schema::v0().with_attribute(
            "env",
            Attribute::optional_string().with_validator(StringValidator::regexp("^[a-z]+$")),
        );
        assert_eq!(validate(&schema, &json!({"env": 7})).len(), 1);
    }

    #[test]
    fn test_invalid_pattern_reported() {
        let err = check_string(&StringValidator::regexp("("), "x").unwrap_err();
        assert!(err.contains("invalid pattern"));
    }

    #[test]
    fn test_pattern_compiled_once() {
        let pattern = "^[a-z0-9-]+-cached$";
        let validator = StringValidator::regexp(pattern);
        assert!(check_string(&validator, "plan-cached").is_ok());
        assert!(check_string(&validator, "Plan").is_err());

        let first = compiled(pattern).unwrap();
        let cache = pattern_cache().lock().unwrap();
        assert!(cache.contains_key(pattern));
        assert_eq!(cache[pattern].as_str(), first.as_str());
    }

    #[test]
    fn test_validate_map_attribute() {
        let schema = Schema::v0().with_attribute("title_i18n", Attribute::optional_string_map());

        assert!(validate(&schema, &json!({"title_i18n": {"fr": "Titre"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"title_i18n": {"fr": 1}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("title_i18n.fr".to_string()));

        let diagnostics = validate(&schema, &json!({"title_i18n": ["fr"]}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_list_attribute() {
        let schema = Schema::v0().with_attribute("tags", Attribute::optional_string_list());

        assert!(validate(&schema, &json!({"tags": ["a", "b"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1".to_string()));
    }

    #[test]
    fn test_validate_required_single_block() {
        let schema = Schema::v0().with_block(
            "primary_contact",
            NestedBlock::single(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("email", Attribute::required_string()),
            )
            .with_min_items(1),
        );

        assert!(validate(
            &schema,
            &json!({"primary_contact": {"name": "Pat", "email": "pat@example.com"}})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required block"));

        let diagnostics = validate(&schema, &json!({"primary_contact": {"name": "Pat"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("primary_contact.email".to_string())
        );
    }

    #[test]
    fn test_validate_nested_list_block() {
        let schema = Schema::v0().with_block(
            "support",
            NestedBlock::single(Block::new().with_block(
                "escalation_contacts",
                NestedBlock::list(Block::new().with_attribute("email", Attribute::optional_string()))
                    .with_max_items(2),
            )),
        );

        let diagnostics = validate(
            &schema,
            &json!({"support": {"escalation_contacts": [{"email": 1}]}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("support.escalation_contacts.0.email".to_string())
        );

        let diagnostics = validate(
            &schema,
            &json!({"support": {"escalation_contacts": [{}, {}, {}]}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let diagnostics = validate(&schema, &json!({"support": {"escalation_contacts": {}}}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "test"})));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }
}
