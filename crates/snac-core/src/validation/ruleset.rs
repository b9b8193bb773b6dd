//! Rule set parsing from YAML.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::validate_ruleset_schema;

/// Name of the SNAC EAC-CPF profile embedded in this crate.
pub const DEFAULT_RULESET: &str = "snac-eac-cpf";

const SNAC_EAC_CPF_YAML: &str = include_str!("../../rules/snac-eac-cpf.yaml");

/// Errors that can occur when loading a rule set.
#[derive(Error, Debug)]
pub enum RulesetError {
    #[error("Failed to read rule set file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Rule set does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Malformed rule set: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Duplicate rule id: {0}")]
    DuplicateId(String),

    #[error("Rule {rule} has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown rule set: {0}")]
    Unknown(String),
}

/// What a rule checks at each context element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Check {
    /// At least one target is present
    Exists,

    /// At least one target has non-blank text
    NotEmpty,

    /// Every target value matches the pattern
    Matches { pattern: String },

    /// Every target value is one of the listed values
    OneOf { values: Vec<String> },
}

/// A check plus the target it applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assertion {
    #[serde(flatten)]
    pub check: Check,

    /// Child element path relative to the context, `/`-separated
    #[serde(default)]
    pub path: Option<String>,

    /// Attribute of the target element to read instead of its text
    #[serde(default)]
    pub attribute: Option<String>,
}

/// One validation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Unique identifier (e.g., "control-record-id")
    pub id: String,

    /// Element path the rule is evaluated at. A leading `/` anchors it at
    /// the document root; otherwise it matches any element whose ancestry
    /// ends with the path.
    pub context: String,

    #[serde(rename = "assert")]
    pub assertion: Assertion,

    /// Reported when the assertion fails
    pub message: String,
}

/// A named collection of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub ruleset_version: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse a rule set from YAML, checking it against the schema first.
    pub fn from_yaml(yaml: &str) -> Result<Self, RulesetError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        validate_ruleset_schema(&value).map_err(RulesetError::Schema)?;

        let ruleset: RuleSet = serde_json::from_value(value)?;
        ruleset.validate_unique_rule_ids()?;
        Ok(ruleset)
    }

    /// Parse a rule set from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RulesetError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a rule set shipped with this crate by name.
    pub fn embedded(name: &str) -> Result<Self, RulesetError> {
        match name {
            DEFAULT_RULESET => Self::from_yaml(SNAC_EAC_CPF_YAML),
            other => Err(RulesetError::Unknown(other.to_string())),
        }
    }

    /// Whether `name` resolves to an embedded rule set.
    pub fn is_embedded(name: &str) -> bool {
        name == DEFAULT_RULESET
    }

    fn validate_unique_rule_ids(&self) -> Result<(), RulesetError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(RulesetError::DuplicateId(rule.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULESET_YAML: &str = r#"
ruleset_version: "1.0"
name: test
rules:
  - id: has-name
    context: /record
    assert:
      kind: exists
      path: name
    message: record must have a name
  - id: kind-known
    context: record
    assert:
      kind: one_of
      attribute: kind
      values: [a, b]
    message: kind must be a or b
"#;

    #[test]
    fn test_parse_ruleset() {
        let ruleset = RuleSet::from_yaml(RULESET_YAML).unwrap();
        assert_eq!(ruleset.name, "test");
        assert_eq!(ruleset.rules.len(), 2);
        assert_eq!(ruleset.rules[0].assertion.check, Check::Exists);
        assert_eq!(ruleset.rules[0].assertion.path.as_deref(), Some("name"));
        assert_eq!(
            ruleset.rules[1].assertion.check,
            Check::OneOf {
                values: vec!["a".into(), "b".into()]
            }
        );
        assert_eq!(ruleset.rules[1].assertion.attribute.as_deref(), Some("kind"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = RULESET_YAML.replace("kind-known", "has-name");
        let err = RuleSet::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, RulesetError::DuplicateId(id) if id == "has-name"));
    }

    #[test]
    fn test_schema_violation_rejected() {
        let yaml = RULESET_YAML.replace("kind: exists", "kind: xpath");
        assert!(matches!(
            RuleSet::from_yaml(&yaml),
            Err(RulesetError::Schema(_))
        ));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(matches!(
            RuleSet::from_yaml("rules: [unclosed"),
            Err(RulesetError::Yaml(_))
        ));
    }

    #[test]
    fn test_embedded_default() {
        let ruleset = RuleSet::embedded(DEFAULT_RULESET).unwrap();
        assert_eq!(ruleset.name, DEFAULT_RULESET);
        assert!(ruleset.rules.iter().any(|r| r.id == "identity-entity-type"));
    }

    #[test]
    fn test_unknown_embedded_name() {
        assert!(matches!(
            RuleSet::embedded("mods"),
            Err(RulesetError::Unknown(name)) if name == "mods"
        ));
        assert!(!RuleSet::is_embedded("mods"));
    }
}
