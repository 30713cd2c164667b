//! Extraction rule definitions and the built-in rule sets.
//!
//! A rule names a capturable span by a literal delimiter pair. Rules are
//! plain data so the same rule set drives both the complete-text scanner
//! and the incremental (streaming) extractor.

use serde::{Deserialize, Serialize};

use crate::classify::ProcessingVariant;

/// Label used for fenced code blocks.
pub const CODE_LABEL: &str = "code";

/// Delimiter for markdown code fences (opens and closes).
pub const CODE_FENCE: &str = "```";

/// Tag names recognized as reasoning output.
pub const REASONING_TAGS: [&str; 3] = ["think", "reasoning", "thought"];

/// How many occurrences of a rule are captured into `extracted`.
///
/// Every matched span is removed from the residual regardless of
/// multiplicity; this only controls what is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// Record only the first occurrence.
    Single,
    /// Record every occurrence in order of appearance.
    #[default]
    All,
}

/// A named capture specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Key under which captured spans are recorded
    pub label: String,
    /// Opening delimiter (literal, case-sensitive)
    pub open: String,
    /// Closing delimiter (literal, case-sensitive)
    pub close: String,
    /// Whether to record one or all occurrences
    #[serde(default)]
    pub multiplicity: Multiplicity,
}

impl ExtractionRule {
    /// Create a rule with an explicit delimiter pair.
    pub fn new(
        label: impl Into<String>,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            open: open.into(),
            close: close.into(),
            multiplicity: Multiplicity::All,
        }
    }

    /// Create a rule for an angle-bracket tag: `<name>...</name>`.
    ///
    /// The tag name doubles as the label.
    pub fn tag(name: &str) -> Self {
        Self::new(name, format!("<{}>", name), format!("</{}>", name))
    }

    /// Create a rule for markdown code fences.
    pub fn code_fence() -> Self {
        Self::new(CODE_LABEL, CODE_FENCE, CODE_FENCE)
    }

    /// Record only the first occurrence.
    pub fn single(mut self) -> Self {
        self.multiplicity = Multiplicity::Single;
        self
    }

    /// Check that both delimiters are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err("extraction rule label must not be empty".to_string());
        }
        if self.open.is_empty() || self.close.is_empty() {
            return Err(format!(
                "extraction rule '{}' needs non-empty open and close delimiters",
                self.label
            ));
        }
        Ok(())
    }
}

/// Built-in rules applied for a processing variant.
pub fn builtin_rules(variant: ProcessingVariant) -> Vec<ExtractionRule> {
    match variant {
        ProcessingVariant::Standard | ProcessingVariant::Custom => Vec::new(),
        ProcessingVariant::Reasoning => REASONING_TAGS
            .iter()
            .map(|name| ExtractionRule::tag(name))
            .collect(),
        ProcessingVariant::Code => vec![ExtractionRule::code_fence()],
    }
}

/// Built-in rules for `variant` followed by `custom` rules.
///
/// Custom rules always apply regardless of variant. Built-ins come first
/// so they win ties at the same position.
pub fn rule_set(variant: ProcessingVariant, custom: &[ExtractionRule]) -> Vec<ExtractionRule> {
    let mut rules = builtin_rules(variant);
    rules.extend(custom.iter().cloned());
    rules
}
