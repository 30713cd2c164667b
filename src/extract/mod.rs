//! Tag extraction engine.
//!
//! Pulls out-of-band content (reasoning tags, code fences, caller-defined
//! tagged fields) out of a model response and returns the cleaned residual.
//!
//! Two entry points share one set of matching semantics:
//! - [`extract`] works on a complete text
//! - [`IncrementalExtractor`] works on a chunk sequence and produces, once
//!   finished, exactly the residual [`extract`] would produce on the
//!   concatenated chunks, whatever the chunk boundaries are
//!
//! # Matching
//!
//! Scanning left to right, the earliest position where any rule's opening
//! delimiter starts wins (the earlier-registered rule on a tie). The span
//! ends at the first closing delimiter of that rule. An opener without a
//! closer is left in place as literal text and scanning continues after it.

mod rules;
mod stream;
mod whitespace;

pub use rules::{
    builtin_rules, rule_set, ExtractionRule, Multiplicity, CODE_FENCE, CODE_LABEL, REASONING_TAGS,
};
pub use stream::{
    extract_incremental, finish_incremental, CarryState, IncrementalExtractor, ScanState,
};
pub use whitespace::{normalize, WhitespaceNormalizer, MAX_CONSECUTIVE_NEWLINES};

use std::collections::BTreeMap;

use tracing::trace;

use crate::classify::ProcessingVariant;

/// Captured spans keyed by rule label, in order of appearance.
pub type Extracted = BTreeMap<String, Vec<String>>;

/// Result of extracting from a complete text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Text with every matched span removed and whitespace normalized
    pub residual: String,
    /// Captured inner spans per label
    pub extracted: Extracted,
}

/// Extract every rule's spans from a complete text.
pub fn extract(text: &str, rules: &[ExtractionRule]) -> Extraction {
    let mut extracted = empty_extracted(rules);
    let raw = scan(text, rules, &mut extracted);
    Extraction {
        residual: normalize(&raw),
        extracted,
    }
}

/// An `Extracted` map with an empty entry for every rule label.
pub fn empty_extracted(rules: &[ExtractionRule]) -> Extracted {
    rules
        .iter()
        .map(|rule| (rule.label.clone(), Vec::new()))
        .collect()
}

/// Remove reasoning tags from a response.
///
/// Returns the cleaned text and the captured reasoning blocks (all `think`
/// blocks first, then `reasoning`, then `thought`).
pub fn clean_thinking_tags(text: &str) -> (String, Vec<String>) {
    let Extraction {
        residual,
        extracted,
    } = extract(text, &builtin_rules(ProcessingVariant::Reasoning));

    let thinking = REASONING_TAGS
        .iter()
        .filter_map(|tag| extracted.get(*tag))
        .flatten()
        .cloned()
        .collect();
    (residual, thinking)
}

/// Rules with usable delimiters, with their registration index.
pub(crate) fn usable(rules: &[ExtractionRule]) -> impl Iterator<Item = (usize, &ExtractionRule)> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| !rule.open.is_empty() && !rule.close.is_empty())
}

/// Record a captured inner span, honoring the rule's multiplicity.
pub(crate) fn record(extracted: &mut Extracted, rule: &ExtractionRule, inner: &str) {
    let entry = extracted.entry(rule.label.clone()).or_default();
    if rule.multiplicity == Multiplicity::Single && !entry.is_empty() {
        return;
    }
    entry.push(inner.trim().to_string());
}

/// Core scan: returns the raw (un-normalized) residual.
pub(crate) fn scan(text: &str, rules: &[ExtractionRule], extracted: &mut Extracted) -> String {
    let mut residual = String::with_capacity(text.len());
    let mut pos = 0;

    while pos < text.len() {
        let Some((start, rule)) = earliest_opener(text, pos, rules) else {
            break;
        };
        residual.push_str(&text[pos..start]);

        let body = start + rule.open.len();
        match text[body..].find(&rule.close) {
            Some(offset) => {
                record(extracted, rule, &text[body..body + offset]);
                pos = body + offset + rule.close.len();
            }
            None => {
                trace!(label = %rule.label, at = start, "unterminated delimiter left inline");
                residual.push_str(&text[start..body]);
                pos = body;
            }
        }
    }

    if pos < text.len() {
        residual.push_str(&text[pos..]);
    }
    residual
}

/// Earliest opener at or after `pos`; ties go to the earlier rule.
fn earliest_opener<'r>(
    text: &str,
    pos: usize,
    rules: &'r [ExtractionRule],
) -> Option<(usize, &'r ExtractionRule)> {
    let haystack = &text[pos..];
    let mut best: Option<(usize, &ExtractionRule)> = None;
    for (_, rule) in usable(rules) {
        if let Some(offset) = haystack.find(&rule.open) {
            let start = pos + offset;
            if best.map_or(true, |(current, _)| start < current) {
                best = Some((start, rule));
            }
        }
    }
    best
}
