use jsonschema::JSONSchema;
use serde_json::{Value, json};
use std::sync::LazyLock;
use thiserror::Error;

use super::contracts::StructuredContent;

/// Fields a generated payload must carry before it is accepted as structured.
pub const REQUIRED_STRUCTURED_FIELDS: [&str; 3] = ["greeting", "mainContent", "disclaimer"];

#[derive(Debug, Error)]
pub enum StructuredValidationError {
    #[error("assistant output is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("structured content acceptance schema failed to compile: {0}")]
    SchemaCompile(String),
    #[error("assistant output is not acceptable structured content: {errors:?}")]
    SchemaViolation { errors: Vec<String> },
}

pub fn validate_structured_json(raw_json: &str) -> Result<StructuredContent, StructuredValidationError> {
    let payload: Value = serde_json::from_str(raw_json.trim())?;
    validate_structured_value(&payload)
}

/// Accepts a payload when the required fields are present and non-empty.
/// Optional fields are read leniently; a malformed optional field is dropped
/// rather than failing the payload.
pub fn validate_structured_value(
    payload: &Value,
) -> Result<StructuredContent, StructuredValidationError> {
    let validator = ACCEPTANCE_VALIDATOR
        .as_ref()
        .map_err(|message| StructuredValidationError::SchemaCompile(message.clone()))?;

    if let Err(validation_errors) = validator.validate(payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(StructuredValidationError::SchemaViolation { errors });
    }

    Ok(StructuredContent::from_value_lenient(payload))
}

fn acceptance_schema() -> Value {
    json!({
        "type": "object",
        "required": REQUIRED_STRUCTURED_FIELDS,
        "properties": {
            "greeting": { "type": "string", "pattern": "\\S" },
            "mainContent": { "type": "object" },
            "disclaimer": { "type": "string", "pattern": "\\S" }
        }
    })
}

static ACCEPTANCE_VALIDATOR: LazyLock<Result<JSONSchema, String>> =
    LazyLock::new(|| JSONSchema::compile(&acceptance_schema()).map_err(|err| err.to_string()));

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{StructuredValidationError, validate_structured_json, validate_structured_value};

    #[test]
    fn rejects_payload_missing_greeting_and_accepts_it_once_added() {
        let mut payload = json!({
            "mainContent": { "summary": "Headaches are common." },
            "disclaimer": "x"
        });

        let err = validate_structured_value(&payload).expect_err("missing greeting must fail");
        assert!(
            matches!(err, StructuredValidationError::SchemaViolation { .. }),
            "expected schema violation, got {err:?}"
        );

        payload["greeting"] = json!("Hello");
        let accepted =
            validate_structured_value(&payload).expect("payload with greeting should pass");
        assert_eq!(accepted.greeting.as_deref(), Some("Hello"));
        assert!(accepted.when_to_seek_help.is_none());
        assert!(accepted.supportive_closing.is_none());
    }

    #[test]
    fn accepts_minimal_payload_with_empty_main_content() {
        let accepted = validate_structured_value(&json!({
            "greeting": "Hi",
            "mainContent": {},
            "disclaimer": "General information only."
        }))
        .expect("minimal payload should pass");

        let main = accepted.main_content.expect("main content should be present");
        assert!(main.key_points.is_empty());
        assert!(main.recommendations.is_empty());
    }

    #[test]
    fn rejects_blank_required_strings() {
        let err = validate_structured_value(&json!({
            "greeting": "   ",
            "mainContent": {},
            "disclaimer": "General information only."
        }))
        .expect_err("blank greeting must fail");
        assert!(matches!(err, StructuredValidationError::SchemaViolation { .. }));
    }

    #[test]
    fn rejects_non_object_payloads() {
        let err = validate_structured_value(&json!(["greeting", "mainContent", "disclaimer"]))
            .expect_err("arrays are not structured content");
        assert!(matches!(err, StructuredValidationError::SchemaViolation { .. }));
    }

    #[test]
    fn validate_json_rejects_free_text() {
        let err = validate_structured_json("Drink plenty of fluids and rest.")
            .expect_err("free text is not json");
        assert!(matches!(err, StructuredValidationError::InvalidJson(_)));
    }
}
