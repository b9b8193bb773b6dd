//! Embedded rule validation for XML documents.
//!
//! A rule set is a YAML list of assertions evaluated at element contexts.
//! Rule sets are checked against a JSON Schema before use.

mod engine;
mod ruleset;
mod schema;

pub use engine::{FailedAssertion, ValidationReport, Validator};
pub use ruleset::{Assertion, Check, Rule, RuleSet, RulesetError, DEFAULT_RULESET};
pub use schema::validate_ruleset_schema;
