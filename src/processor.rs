//! Response processing.
//!
//! [`ResponseProcessor`] ties the classifier, the extraction engine and the
//! hook pipeline together. `process` handles a complete response:
//!
//! 1. `PreProcess` hooks (`input_text` = raw response)
//! 2. classify the source identifier
//! 3. select built-in rules for the variant, then custom rules
//! 4. `PreClean` hooks
//! 5. extract from `input_text`
//! 6. populate `output_text`, `extracted` and variant metadata
//! 7. `PostClean` hooks
//! 8. `PostProcess` hooks
//!
//! `process_stream` runs the incremental extractor per chunk, dispatches
//! `StreamChunk` once per chunk and, at the end of the stream, runs
//! `PreProcess`/`PostProcess` once over the accumulated text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::classify::{ProcessingVariant, ResponseClassifier};
use crate::error::{Error, Result};
use crate::extract::{
    builtin_rules, extract, rule_set, ExtractionRule, Extracted, IncrementalExtractor, CODE_LABEL,
    REASONING_TAGS,
};
use crate::hooks::{HookContext, HookPipeline, HookStage, Metadata};

/// Language recorded for code blocks without an info string.
pub const DEFAULT_CODE_LANGUAGE: &str = "text";

/// A processed complete response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedResponse {
    /// Cleaned text
    pub content: String,
    /// Captured spans per rule label
    pub extracted: Extracted,
    pub metadata: Metadata,
    /// The response exactly as received
    pub raw_content: String,
}

impl ProcessedResponse {
    /// Reasoning blocks, grouped by tag vocabulary.
    pub fn thinking(&self) -> Vec<String> {
        REASONING_TAGS
            .iter()
            .filter_map(|tag| self.extracted.get(*tag))
            .flatten()
            .cloned()
            .collect()
    }

    /// Captured spans for one label (empty when the rule did not apply).
    pub fn extracted_for(&self, label: &str) -> &[String] {
        self.extracted.get(label).map_or(&[], Vec::as_slice)
    }
}

/// One unit of a processed stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedChunk {
    /// Cleaned text released by this chunk (may be empty)
    pub content: String,
    /// Set on the last chunk, which carries the end-of-stream flush
    pub is_final: bool,
}

/// A fenced code block split into its info string and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

impl CodeBlock {
    /// Parse a captured fence body (the text between the fences).
    pub fn parse(span: &str) -> Self {
        if let Some((head, rest)) = span.split_once('\n') {
            let head = head.trim();
            if !head.is_empty() && head.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Self {
                    language: head.to_string(),
                    code: rest.trim().to_string(),
                };
            }
        }
        Self {
            language: DEFAULT_CODE_LANGUAGE.to_string(),
            code: span.trim().to_string(),
        }
    }
}

/// Metadata the processor attaches for a variant.
fn variant_metadata(
    variant: ProcessingVariant,
    source_id: &str,
    extracted: &Extracted,
) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("variant".into(), Value::from(variant.as_str()));
    metadata.insert("source_id".into(), Value::from(source_id));

    match variant {
        ProcessingVariant::Reasoning => {
            let count: usize = REASONING_TAGS
                .iter()
                .filter_map(|tag| extracted.get(*tag))
                .map(Vec::len)
                .sum();
            metadata.insert("thinking_blocks_count".into(), Value::from(count));
        }
        ProcessingVariant::Code => {
            let blocks: Vec<CodeBlock> = extracted
                .get(CODE_LABEL)
                .into_iter()
                .flatten()
                .map(|span| CodeBlock::parse(span))
                .collect();
            metadata.insert("code_blocks_count".into(), Value::from(blocks.len()));
            metadata.insert(
                "code_blocks".into(),
                serde_json::to_value(&blocks).unwrap_or_default(),
            );
        }
        ProcessingVariant::Standard | ProcessingVariant::Custom => {}
    }
    metadata
}

/// Add processor metadata without replacing keys a hook already set.
fn merge_metadata(target: &mut Metadata, computed: Metadata) {
    for (key, value) in computed {
        target.entry(key).or_insert(value);
    }
}

/// Classifier + extraction + hooks.
#[derive(Debug)]
pub struct ResponseProcessor {
    classifier: ResponseClassifier,
    hooks: HookPipeline,
    custom_rules: Vec<ExtractionRule>,
}

impl Default for ResponseProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseProcessor {
    /// Processor with the default classifier, no hooks and no custom rules.
    pub fn new() -> Self {
        Self::with_classifier(ResponseClassifier::with_defaults())
    }

    pub fn with_classifier(classifier: ResponseClassifier) -> Self {
        Self {
            classifier,
            hooks: HookPipeline::new(),
            custom_rules: Vec::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: HookPipeline) -> Self {
        self.hooks = hooks;
        self
    }

    /// Custom rules applied to every response regardless of variant.
    pub fn with_rules(mut self, rules: Vec<ExtractionRule>) -> Self {
        self.custom_rules = rules;
        self
    }

    pub fn add_rule(&mut self, rule: ExtractionRule) {
        self.custom_rules.push(rule);
    }

    pub fn custom_rules(&self) -> &[ExtractionRule] {
        &self.custom_rules
    }

    pub fn classifier(&self) -> &ResponseClassifier {
        &self.classifier
    }

    pub fn classifier_mut(&mut self) -> &mut ResponseClassifier {
        &mut self.classifier
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookPipeline {
        &mut self.hooks
    }

    /// Shorthand for `hooks_mut().register(..)`.
    pub fn register_hook<F>(&mut self, stage: HookStage, callback: F)
    where
        F: FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.hooks.register(stage, callback);
    }

    /// Process a complete response.
    pub fn process(&mut self, raw: &str, source_id: &str) -> Result<ProcessedResponse> {
        self.process_with_rules(raw, source_id, &[])
    }

    /// Process a complete response with additional per-call rules.
    pub fn process_with_rules(
        &mut self,
        raw: &str,
        source_id: &str,
        extra_rules: &[ExtractionRule],
    ) -> Result<ProcessedResponse> {
        let mut ctx = HookContext::new(source_id, raw);
        self.hooks.dispatch(HookStage::PreProcess, &mut ctx)?;

        let variant = self.classifier.classify(source_id);
        let mut rules = rule_set(variant, &self.custom_rules);
        rules.extend(extra_rules.iter().cloned());

        self.hooks.dispatch(HookStage::PreClean, &mut ctx)?;

        let extraction = extract(&ctx.input_text, &rules);
        merge_metadata(
            &mut ctx.metadata,
            variant_metadata(variant, source_id, &extraction.extracted),
        );
        ctx.output_text = extraction.residual;
        ctx.extracted = extraction.extracted;

        self.hooks.dispatch(HookStage::PostClean, &mut ctx)?;
        self.hooks.dispatch(HookStage::PostProcess, &mut ctx)?;

        debug!(source_id, %variant, rules = rules.len(), "processed response");
        Ok(ProcessedResponse {
            content: ctx.output_text,
            extracted: ctx.extracted,
            metadata: ctx.metadata,
            raw_content: raw.to_string(),
        })
    }

    /// Process a chunked response lazily.
    ///
    /// Yields one [`ProcessedChunk`] per input chunk and a final chunk with
    /// `is_final` set. The stream is single-pass; after the final chunk,
    /// [`ProcessStream::response`] holds the whole-response view.
    pub fn process_stream<I, E>(
        &mut self,
        chunks: I,
        source_id: &str,
    ) -> ProcessStream<'_, I::IntoIter>
    where
        I: IntoIterator<Item = std::result::Result<String, E>>,
        E: Into<Error>,
    {
        let variant = self.classifier.classify(source_id);
        let rules = rule_set(variant, &self.custom_rules);
        debug!(source_id, %variant, rules = rules.len(), "processing stream");
        ProcessStream {
            hooks: &mut self.hooks,
            chunks: chunks.into_iter(),
            source_id: source_id.to_string(),
            variant,
            extractor: Some(IncrementalExtractor::new(rules)),
            raw: String::new(),
            emitted: String::new(),
            metadata: Metadata::new(),
            response: None,
            done: false,
        }
    }
}

/// Lazy, forward-only processed stream.
pub struct ProcessStream<'p, I> {
    hooks: &'p mut HookPipeline,
    chunks: I,
    source_id: String,
    variant: ProcessingVariant,
    extractor: Option<IncrementalExtractor>,
    /// Raw text received so far
    raw: String,
    /// Text yielded so far
    emitted: String,
    /// Metadata written by chunk hooks
    metadata: Metadata,
    response: Option<ProcessedResponse>,
    done: bool,
}

impl<'p, I> ProcessStream<'p, I> {
    /// The whole-response view, available once the final chunk was yielded.
    pub fn response(&self) -> Option<&ProcessedResponse> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<ProcessedResponse> {
        self.response
    }

    pub fn variant(&self) -> ProcessingVariant {
        self.variant
    }

    /// Run `StreamChunk` hooks over text the extractor released.
    fn dispatch_chunk(
        &mut self,
        input: &str,
        emit: String,
        extracted: Extracted,
    ) -> Result<String> {
        let mut ctx = HookContext::new(self.source_id.as_str(), input);
        ctx.chunk_text = Some(emit);
        ctx.output_text = self.emitted.clone();
        ctx.extracted = extracted;
        ctx.metadata = std::mem::take(&mut self.metadata);

        let dispatched = self.hooks.dispatch(HookStage::StreamChunk, &mut ctx);
        self.metadata = ctx.metadata;
        dispatched?;

        let content = ctx.chunk_text.unwrap_or_default();
        self.emitted.push_str(&content);
        Ok(content)
    }

    fn finish(&mut self) -> Result<ProcessedChunk> {
        let (tail, extracted) = match self.extractor.take() {
            Some(extractor) => extractor.finish(),
            None => (String::new(), Extracted::new()),
        };
        let content = self.dispatch_chunk("", tail, extracted.clone())?;

        let mut ctx = HookContext::new(self.source_id.as_str(), self.raw.as_str());
        ctx.metadata = std::mem::take(&mut self.metadata);
        merge_metadata(
            &mut ctx.metadata,
            variant_metadata(self.variant, &self.source_id, &extracted),
        );
        ctx.output_text = self.emitted.clone();
        ctx.extracted = extracted;

        self.hooks.dispatch(HookStage::PreProcess, &mut ctx)?;
        self.hooks.dispatch(HookStage::PostProcess, &mut ctx)?;

        debug!(source_id = %self.source_id, bytes = self.raw.len(), "stream finished");
        self.response = Some(ProcessedResponse {
            content: ctx.output_text,
            extracted: ctx.extracted,
            metadata: ctx.metadata,
            raw_content: std::mem::take(&mut self.raw),
        });
        Ok(ProcessedChunk {
            content,
            is_final: true,
        })
    }
}

impl<'p, I, E> Iterator for ProcessStream<'p, I>
where
    I: Iterator<Item = std::result::Result<String, E>>,
    E: Into<Error>,
{
    type Item = Result<ProcessedChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.chunks.next() {
            Some(Ok(chunk)) => {
                self.raw.push_str(&chunk);
                let (emit, extracted) = match self.extractor.as_mut() {
                    Some(extractor) => {
                        let emit = extractor.feed(&chunk);
                        (emit, extractor.carry().extracted().clone())
                    }
                    None => (String::new(), Extracted::new()),
                };
                self.dispatch_chunk(&chunk, emit, extracted).map(|content| ProcessedChunk {
                    content,
                    is_final: false,
                })
            }
            Some(Err(err)) => Err(err.into()),
            None => self.finish(),
        };

        if !matches!(result, Ok(ProcessedChunk { is_final: false, .. })) {
            self.done = true;
        }
        Some(result)
    }
}

/// Clean a response using the default classifier and built-in rules only.
pub fn auto_clean_response(text: &str, source_id: &str) -> String {
    let variant = ResponseClassifier::with_defaults().classify(source_id);
    extract(text, &builtin_rules(variant)).residual
}
