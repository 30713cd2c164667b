//! Source classification.
//!
//! Maps a backend/source identifier (usually a model name such as
//! `deepseek-r1:14b`) to the processing variant that decides which
//! extraction rules apply.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Processing variant selected for a response source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingVariant {
    /// No built-in extraction, whitespace cleanup only
    #[default]
    Standard,
    /// Reasoning models emitting `<think>`-style blocks
    Reasoning,
    /// Code-focused models emitting fenced code blocks
    Code,
    /// Caller-supplied rules only
    Custom,
}

impl ProcessingVariant {
    /// All variants, in declaration order.
    pub fn all() -> &'static [ProcessingVariant] {
        &[
            ProcessingVariant::Standard,
            ProcessingVariant::Reasoning,
            ProcessingVariant::Code,
            ProcessingVariant::Custom,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingVariant::Standard => "standard",
            ProcessingVariant::Reasoning => "reasoning",
            ProcessingVariant::Code => "code",
            ProcessingVariant::Custom => "custom",
        }
    }
}

impl fmt::Display for ProcessingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(ProcessingVariant::Standard),
            "reasoning" | "thinking" => Ok(ProcessingVariant::Reasoning),
            "code" => Ok(ProcessingVariant::Code),
            "custom" => Ok(ProcessingVariant::Custom),
            other => Err(format!(
                "unknown processing variant '{}' (expected standard, reasoning, code or custom)",
                other
            )),
        }
    }
}

/// A single token → variant mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Substring searched for in the lower-cased source identifier
    pub token: String,
    pub variant: ProcessingVariant,
}

impl ClassificationRule {
    pub fn new(token: impl Into<String>, variant: ProcessingVariant) -> Self {
        Self {
            token: token.into().to_lowercase(),
            variant,
        }
    }

    fn matches(&self, source_id: &str) -> bool {
        source_id.contains(&self.token)
    }
}

/// Well-known model families.
const DEFAULT_RULES: &[(&str, ProcessingVariant)] = &[
    ("deepseek-r1", ProcessingVariant::Reasoning),
    ("qwen", ProcessingVariant::Reasoning),
    ("codellama", ProcessingVariant::Code),
    ("starcoder", ProcessingVariant::Code),
    ("phind-codellama", ProcessingVariant::Code),
];

/// Ordered, mutable classification rule set.
///
/// The first registered rule whose token is contained in the identifier
/// wins; an identifier matching nothing is [`ProcessingVariant::Standard`].
/// Registration takes `&mut self`, so sharing a classifier across threads
/// requires the caller to wrap it (e.g. in a `RwLock`).
#[derive(Debug, Clone, Default)]
pub struct ResponseClassifier {
    rules: Vec<ClassificationRule>,
}

impl ResponseClassifier {
    /// Classifier with no rules (everything is `Standard`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier preloaded with the well-known model families.
    pub fn with_defaults() -> Self {
        let mut classifier = Self::new();
        for (token, variant) in DEFAULT_RULES {
            classifier.register_rule(*token, *variant);
        }
        classifier
    }

    /// Append a rule. Earlier rules keep precedence.
    pub fn register_rule(&mut self, token: impl Into<String>, variant: ProcessingVariant) {
        let rule = ClassificationRule::new(token, variant);
        debug!(token = %rule.token, variant = %rule.variant, "registered classification rule");
        self.rules.push(rule);
    }

    /// Classify a source identifier.
    pub fn classify(&self, source_id: &str) -> ProcessingVariant {
        let lowered = source_id.to_lowercase();
        let variant = self
            .rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.variant)
            .unwrap_or_default();
        debug!(source_id, %variant, "classified source");
        variant
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }
}
