//! Residual whitespace normalization.
//!
//! Removing a tagged span tends to leave stacks of blank lines and trailing
//! spaces behind. The normalizer works on whitespace *runs*: a run is only
//! written out once the next visible character shows it is interior, which
//! lets the streaming path produce exactly what the complete-text path does.
//!
//! Rules for an interior run:
//! - no newline: kept verbatim (spacing inside a line)
//! - with newlines: everything before the last newline is dropped (trailing
//!   spaces and whitespace-only lines), newlines are capped, and the
//!   indentation after the last newline is kept
//!
//! Leading and trailing runs are dropped entirely.

/// Maximum consecutive newlines kept in the residual (one blank line).
pub const MAX_CONSECUTIVE_NEWLINES: usize = 2;

/// Incremental whitespace normalizer.
#[derive(Debug, Clone, Default)]
pub struct WhitespaceNormalizer {
    /// Whitespace seen since the last visible character
    pending: String,
    /// Whether a visible character has been written yet
    started: bool,
}

impl WhitespaceNormalizer {
    /// Create a normalizer at the start of a text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text, appending everything that is already decided to `out`.
    pub fn push(&mut self, text: &str, out: &mut String) {
        for c in text.chars() {
            if c.is_whitespace() {
                if self.started {
                    self.pending.push(c);
                }
                continue;
            }
            if !self.pending.is_empty() {
                self.flush_run(out);
            }
            out.push(c);
            self.started = true;
        }
    }

    /// End of text: the held run is trailing whitespace and is dropped.
    pub fn finish(&mut self) {
        self.pending.clear();
    }

    /// Whether whitespace is currently held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn flush_run(&mut self, out: &mut String) {
        match self.pending.rfind('\n') {
            None => out.push_str(&self.pending),
            Some(last) => {
                let newlines = self.pending.matches('\n').count();
                for _ in 0..newlines.min(MAX_CONSECUTIVE_NEWLINES) {
                    out.push('\n');
                }
                out.push_str(&self.pending[last + 1..]);
            }
        }
        self.pending.clear();
    }
}

/// Normalize a complete text.
pub fn normalize(text: &str) -> String {
    let mut normalizer = WhitespaceNormalizer::new();
    let mut out = String::with_capacity(text.len());
    normalizer.push(text, &mut out);
    normalizer.finish();
    out
}
