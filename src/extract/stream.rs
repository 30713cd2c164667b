//! Incremental (streaming) extraction.
//!
//! The extractor consumes characters one at a time and keeps a small carry
//! buffer for anything that could still be the start of a delimiter. Text
//! is released as soon as it can no longer be part of a matched span, so a
//! tag split across chunk boundaries (`"<thi"` + `"nk>"`) is still removed
//! and nothing inside it ever reaches the caller.
//!
//! Tie handling mirrors the complete-text scanner: when one rule's opener
//! fully matches, the buffer keeps growing while an earlier-registered rule
//! could still match a longer opener at the same position.

use tracing::trace;

use super::whitespace::WhitespaceNormalizer;
use super::{empty_extracted, record, scan, usable, Extracted, ExtractionRule};

/// Where the scanner currently is relative to a delimiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    /// Plain residual text
    #[default]
    Outside,
    /// Buffered characters may be the start of an opening delimiter
    MatchingOpenPrefix,
    /// Inside a matched span, waiting for its closer
    InsideTag,
    /// Inside a span; buffered characters may be the start of its closer
    MatchingClosePrefix,
}

/// Everything an in-progress stream has to remember between chunks.
#[derive(Debug, Clone, Default)]
pub struct CarryState {
    state: ScanState,
    /// Characters that may still turn out to be a delimiter
    pending: String,
    /// Lowest-index rule whose opener equals `pending`
    candidate: Option<usize>,
    /// Rule whose span is open
    active: Option<usize>,
    /// Content captured since the opener
    inner: String,
    normalizer: WhitespaceNormalizer,
    extracted: Extracted,
}

impl CarryState {
    /// Fresh state for a stream using `rules`.
    pub fn new(rules: &[ExtractionRule]) -> Self {
        Self {
            extracted: empty_extracted(rules),
            ..Self::default()
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Characters held back because they may be part of a delimiter.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Spans captured so far.
    pub fn extracted(&self) -> &Extracted {
        &self.extracted
    }

    fn feed(&mut self, chunk: &str, rules: &[ExtractionRule]) -> String {
        let mut raw = String::new();
        for c in chunk.chars() {
            self.step(c, rules, &mut raw);
        }
        let mut out = String::with_capacity(raw.len());
        self.normalizer.push(&raw, &mut out);
        out
    }

    fn finish(&mut self, rules: &[ExtractionRule]) -> String {
        let mut raw = String::new();
        loop {
            if let Some(idx) = self.active.take() {
                let rule = &rules[idx];
                trace!(label = %rule.label, "stream ended inside an unterminated span");
                raw.push_str(&rule.open);
                let mut rest = std::mem::take(&mut self.inner);
                rest.push_str(&self.pending);
                self.pending.clear();
                self.state = ScanState::Outside;
                raw.push_str(&scan(&rest, rules, &mut self.extracted));
                break;
            }
            if self.pending.is_empty() {
                self.state = ScanState::Outside;
                break;
            }
            self.resolve_open(rules, &mut raw, true);
        }

        let mut out = String::with_capacity(raw.len());
        self.normalizer.push(&raw, &mut out);
        self.normalizer.finish();
        out
    }

    fn step(&mut self, c: char, rules: &[ExtractionRule], raw: &mut String) {
        match self.active {
            Some(idx) => self.step_inside(c, &rules[idx]),
            None => {
                self.pending.push(c);
                self.resolve_open(rules, raw, false);
            }
        }
    }

    /// Decide what the buffered opener candidate is.
    ///
    /// At end of input no longer opener can complete, so the buffer is
    /// resolved immediately.
    fn resolve_open(&mut self, rules: &[ExtractionRule], raw: &mut String, at_end: bool) {
        for (idx, rule) in usable(rules) {
            if rule.open == self.pending && self.candidate.map_or(true, |best| idx < best) {
                self.candidate = Some(idx);
            }
        }

        if !at_end && self.open_still_possible(rules) {
            self.state = ScanState::MatchingOpenPrefix;
            return;
        }

        if let Some(idx) = self.candidate.take() {
            let rest = self.pending.split_off(rules[idx].open.len());
            self.pending.clear();
            self.inner.clear();
            self.active = Some(idx);
            self.state = ScanState::InsideTag;
            for c in rest.chars() {
                self.step(c, rules, raw);
            }
            return;
        }

        // Not a delimiter at this position: the first character is residual
        // and the rest is re-examined from the next position.
        let first = self.pending.remove(0);
        raw.push(first);
        let rest = std::mem::take(&mut self.pending);
        self.state = ScanState::Outside;
        for c in rest.chars() {
            self.step(c, rules, raw);
        }
    }

    fn open_still_possible(&self, rules: &[ExtractionRule]) -> bool {
        usable(rules).any(|(idx, rule)| {
            rule.open.len() > self.pending.len()
                && rule.open.starts_with(&self.pending)
                && self.candidate.map_or(true, |best| idx < best)
        })
    }

    fn step_inside(&mut self, c: char, rule: &ExtractionRule) {
        self.pending.push(c);
        loop {
            if self.pending == rule.close {
                record(&mut self.extracted, rule, &self.inner);
                self.inner.clear();
                self.pending.clear();
                self.active = None;
                self.state = ScanState::Outside;
                return;
            }
            if rule.close.starts_with(&self.pending) {
                self.state = ScanState::MatchingClosePrefix;
                return;
            }
            let first = self.pending.remove(0);
            self.inner.push(first);
            if self.pending.is_empty() {
                self.state = ScanState::InsideTag;
                return;
            }
        }
    }
}

/// Feed one chunk through the extractor.
///
/// Returns the residual text that is safe to emit now and the state to
/// pass with the next chunk.
pub fn extract_incremental(
    chunk: &str,
    rules: &[ExtractionRule],
    mut carry: CarryState,
) -> (String, CarryState) {
    let emit = carry.feed(chunk, rules);
    (emit, carry)
}

/// Flush a stream at end of input.
///
/// An open span without its closer is released as literal text, exactly as
/// the complete-text scanner treats it.
pub fn finish_incremental(rules: &[ExtractionRule], mut carry: CarryState) -> (String, Extracted) {
    let emit = carry.finish(rules);
    (emit, carry.extracted)
}

/// Owned incremental extractor bound to one rule set.
#[derive(Debug, Clone)]
pub struct IncrementalExtractor {
    rules: Vec<ExtractionRule>,
    carry: CarryState,
}

impl IncrementalExtractor {
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        let carry = CarryState::new(&rules);
        Self { rules, carry }
    }

    /// Feed a chunk; returns the residual text decided so far.
    pub fn feed(&mut self, chunk: &str) -> String {
        self.carry.feed(chunk, &self.rules)
    }

    /// Flush at end of input; returns the remaining residual and all
    /// captured spans.
    pub fn finish(mut self) -> (String, Extracted) {
        let emit = self.carry.finish(&self.rules);
        (emit, self.carry.extracted)
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    pub fn carry(&self) -> &CarryState {
        &self.carry
    }
}
