//! JSON Schema check for rule sets.
//!
//! Rule sets are validated against `rules/ruleset.schema.json` before they
//! are deserialized.

use std::sync::OnceLock;

/// Embedded rule set schema (loaded at compile time).
const RULESET_SCHEMA_JSON: &str = include_str!("../../rules/ruleset.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(RULESET_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a rule set JSON value against the schema.
///
/// Returns every violation with the instance path it was found at.
pub fn validate_ruleset_schema(ruleset_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(ruleset_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> serde_json::Value {
        json!({
            "ruleset_version": "1.0",
            "name": "test",
            "rules": [{
                "id": "has-name",
                "context": "/record",
                "assert": { "kind": "exists", "path": "name" },
                "message": "record must have a name"
            }]
        })
    }

    #[test]
    fn test_minimal_ruleset_passes() {
        assert!(validate_ruleset_schema(&minimal()).is_ok());
    }

    #[test]
    fn test_empty_rules_fail() {
        let mut value = minimal();
        value["rules"] = json!([]);
        assert!(validate_ruleset_schema(&value).is_err());
    }

    #[test]
    fn test_matches_requires_pattern() {
        let mut value = minimal();
        value["rules"][0]["assert"] = json!({ "kind": "matches", "path": "name" });
        let errors = validate_ruleset_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_one_of_requires_values() {
        let mut value = minimal();
        value["rules"][0]["assert"] = json!({ "kind": "one_of", "path": "name" });
        assert!(validate_ruleset_schema(&value).is_err());
    }

    #[test]
    fn test_unknown_kind_fails() {
        let mut value = minimal();
        value["rules"][0]["assert"]["kind"] = json!("xpath");
        assert!(validate_ruleset_schema(&value).is_err());
    }

    #[test]
    fn test_invalid_rule_id_fails() {
        let mut value = minimal();
        value["rules"][0]["id"] = json!("Has Name");
        assert!(validate_ruleset_schema(&value).is_err());
    }

    #[test]
    fn test_additional_properties_fail() {
        let mut value = minimal();
        value["severity"] = json!("high");
        assert!(validate_ruleset_schema(&value).is_err());
    }

    #[test]
    fn test_error_carries_instance_path() {
        let mut value = minimal();
        value["rules"][0]["message"] = json!("");
        let errors = validate_ruleset_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/rules/0/message")));
    }
}
