//! Built-in attribute validators

use crate::jsontypes;
use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use regex::Regex;
use std::sync::Arc;

/// Requires string values to match a regular expression
pub struct StringPatternValidator {
    pattern: Regex,
    description: String,
}

impl StringPatternValidator {
    pub fn new(pattern: Regex, description: impl Into<String>) -> Arc<dyn Validator> {
        Arc::new(Self {
            pattern,
            description: description.into(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        format!("value must be {}", self.description)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Dynamic::String(s) = &request.config_value.value {
            if !self.pattern.is_match(s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("'{}' must be {}", s, self.description),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

/// Requires string values to be an encoded JSON object
pub struct JsonObjectValidator;

impl JsonObjectValidator {
    pub fn create() -> Arc<dyn Validator> {
        Arc::new(Self)
    }
}

impl Validator for JsonObjectValidator {
    fn description(&self) -> String {
        "value must be a JSON encoded object".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Dynamic::String(s) = &request.config_value.value {
            let detail = match jsontypes::parse(s) {
                Ok(serde_json::Value::Object(_)) => None,
                Ok(other) => Some(format!("expected a JSON object, got {}", json_kind(&other))),
                Err(e) => Some(e.to_string()),
            };
            if let Some(detail) = detail {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid JSON for {}", request.path), detail)
                        .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
