//! Rule evaluation over an XML document.
//!
//! Elements are addressed by local name, so namespaced EAC-CPF documents
//! and bare ones validate the same way.

use regex::Regex;
use roxmltree::{Document, Node};
use serde::Serialize;
use tracing::debug;

use super::ruleset::{Check, Rule, RuleSet, RulesetError};
use crate::records::{parse_xml, DocumentRecord, RecordError};

/// A rule that failed at one context element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAssertion {
    pub rule_id: String,

    /// Element path of the context element, e.g. `/eac-cpf/control`
    pub location: String,

    pub message: String,
}

impl FailedAssertion {
    /// One report line, e.g. `control-record-id: ... (at /eac-cpf/control)`.
    pub fn line(&self) -> String {
        format!("{}: {} (at {})", self.rule_id, self.message, self.location)
    }
}

/// Validation verdict with every failed assertion in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub failed_assertions: Vec<FailedAssertion>,
}

impl ValidationReport {
    pub fn messages(&self) -> impl Iterator<Item = String> + '_ {
        self.failed_assertions.iter().map(FailedAssertion::line)
    }
}

struct CompiledRule {
    rule: Rule,
    context: ContextPath,
    target: Vec<String>,
    pattern: Option<Regex>,
}

enum ContextPath {
    /// The document node itself
    Document,

    /// Element path from the root element
    Anchored(Vec<String>),

    /// Trailing element path at any depth
    Suffix(Vec<String>),
}

impl ContextPath {
    fn parse(context: &str) -> Self {
        if context == "/" {
            return Self::Document;
        }
        let segments = split_path(context);
        if context.starts_with('/') {
            Self::Anchored(segments)
        } else {
            Self::Suffix(segments)
        }
    }

    fn matches(&self, node: Node<'_, '_>, ancestry: &[&str]) -> bool {
        match self {
            Self::Document => node.is_root(),
            Self::Anchored(path) => node.is_element() && same_path(ancestry, path),
            Self::Suffix(path) => {
                node.is_element()
                    && ancestry.len() >= path.len()
                    && same_path(&ancestry[ancestry.len() - path.len()..], path)
            }
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn same_path(names: &[&str], path: &[String]) -> bool {
    names.len() == path.len() && names.iter().zip(path).all(|(a, b)| *a == b)
}

/// Evaluates a [`RuleSet`] against documents.
pub struct Validator {
    name: String,
    rules: Vec<CompiledRule>,
}

impl Validator {
    /// Compile a rule set. Fails if any `matches` pattern is not a valid regex.
    pub fn new(ruleset: RuleSet) -> Result<Self, RulesetError> {
        let rules = ruleset
            .rules
            .into_iter()
            .map(|rule| -> Result<CompiledRule, RulesetError> {
                let pattern = match &rule.assertion.check {
                    Check::Matches { pattern } => {
                        Some(Regex::new(pattern).map_err(|source| RulesetError::InvalidPattern {
                            rule: rule.id.clone(),
                            source,
                        })?)
                    }
                    _ => None,
                };
                Ok(CompiledRule {
                    context: ContextPath::parse(&rule.context),
                    target: rule.assertion.path.as_deref().map(split_path).unwrap_or_default(),
                    pattern,
                    rule,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: ruleset.name,
            rules,
        })
    }

    /// Compile a rule set embedded in this crate.
    pub fn embedded(name: &str) -> Result<Self, RulesetError> {
        Self::new(RuleSet::embedded(name)?)
    }

    pub fn ruleset_name(&self) -> &str {
        &self.name
    }

    /// Validate a document record.
    pub fn validate(&self, document: &DocumentRecord) -> Result<ValidationReport, RecordError> {
        let tree = parse_xml(&document.text)?;
        Ok(self.validate_tree(&tree))
    }

    fn validate_tree(&self, tree: &Document<'_>) -> ValidationReport {
        let mut failed_assertions = Vec::new();

        for compiled in &self.rules {
            for node in tree.descendants() {
                let ancestry = element_names(node);
                if !compiled.context.matches(node, &ancestry) {
                    continue;
                }
                if !compiled.holds_at(node) {
                    failed_assertions.push(FailedAssertion {
                        rule_id: compiled.rule.id.clone(),
                        location: format!("/{}", ancestry.join("/")),
                        message: compiled.rule.message.clone(),
                    });
                }
            }
        }

        debug!(
            ruleset = %self.name,
            failed = failed_assertions.len(),
            "document validated"
        );

        ValidationReport {
            valid: failed_assertions.is_empty(),
            failed_assertions,
        }
    }
}

impl CompiledRule {
    fn holds_at(&self, context: Node<'_, '_>) -> bool {
        let targets = select(context, &self.target);
        let attribute = self.rule.assertion.attribute.as_deref();
        let values: Vec<String> = match attribute {
            Some(name) => targets
                .iter()
                .filter_map(|node| node.attribute(name))
                .map(|value| value.trim().to_string())
                .collect(),
            None => targets.iter().map(|node| text_of(*node)).collect(),
        };

        match &self.rule.assertion.check {
            Check::Exists => !values.is_empty(),
            Check::NotEmpty => values.iter().any(|value| !value.is_empty()),
            Check::Matches { .. } => match &self.pattern {
                Some(pattern) => values.iter().all(|value| pattern.is_match(value)),
                None => true,
            },
            Check::OneOf { values: allowed } => values.iter().all(|value| allowed.contains(value)),
        }
    }
}

/// Local names of the element and its element ancestors, root first.
fn element_names<'a>(node: Node<'a, '_>) -> Vec<&'a str> {
    let mut names: Vec<&str> = node
        .ancestors()
        .filter(Node::is_element)
        .map(|n| n.tag_name().name())
        .collect();
    names.reverse();
    names
}

/// Follow a child element path from `context`.
fn select<'a, 'input>(context: Node<'a, 'input>, path: &[String]) -> Vec<Node<'a, 'input>> {
    let mut current = vec![context];
    for segment in path {
        current = current
            .iter()
            .flat_map(|node| node.children())
            .filter(|child| child.is_element() && child.tag_name().name() == segment)
            .collect();
    }
    current
}

/// Concatenated, trimmed descendant text.
fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}
