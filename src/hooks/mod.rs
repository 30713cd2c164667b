//! Lifecycle hooks.
//!
//! A [`HookPipeline`] holds ordered callback lists per [`HookStage`]. Each
//! dispatch runs a stage's callbacks in registration order over one shared
//! [`HookContext`]; every mutation is visible to the next callback and to
//! the caller once the stage returns.
//!
//! # Failure handling
//!
//! When a callback fails, the rest of its stage is skipped, the failure is
//! stored in [`HookContext::error`] and the [`HookStage::Error`] callbacks
//! run once. If an error callback clears `ctx.error`, the failure is
//! swallowed and dispatch returns `Ok`; otherwise it is returned to the
//! caller. Failures inside the error stage itself are logged and do not
//! recurse.
//!
//! ```
//! use otk::hooks::{HookContext, HookPipeline, HookStage};
//!
//! let mut hooks = HookPipeline::new();
//! hooks.register(HookStage::PostClean, |ctx| {
//!     ctx.output_text.push('!');
//!     Ok(())
//! });
//!
//! let mut ctx = HookContext::new("llama3", "hello");
//! ctx.output_text = "hello".to_string();
//! hooks.dispatch(HookStage::PostClean, &mut ctx).unwrap();
//! assert_eq!(ctx.output_text, "hello!");
//! ```

pub mod presets;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extract::Extracted;

/// Free-form metadata attached to a response.
pub type Metadata = BTreeMap<String, Value>;

/// Fixed points in the processing lifecycle where callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before classification; `input_text` holds the raw response
    PreProcess,
    /// After classification, before extraction
    PreClean,
    /// After extraction; `output_text` and `extracted` are populated
    PostClean,
    /// Last stage before the result is returned
    PostProcess,
    /// A callback in another stage failed; `error` is set
    Error,
    /// Once per streamed chunk; `chunk_text` is set
    StreamChunk,
}

impl HookStage {
    pub fn all() -> &'static [HookStage] {
        &[
            HookStage::PreProcess,
            HookStage::PreClean,
            HookStage::PostClean,
            HookStage::PostProcess,
            HookStage::Error,
            HookStage::StreamChunk,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::PreProcess => "pre_process",
            HookStage::PreClean => "pre_clean",
            HookStage::PostClean => "post_clean",
            HookStage::PostProcess => "post_process",
            HookStage::Error => "error",
            HookStage::StreamChunk => "stream_chunk",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failing hook callback.
#[derive(Debug, Error)]
#[error("{stage} hook #{index} failed: {source}")]
pub struct HookFailure {
    /// Stage whose callback failed
    pub stage: HookStage,
    /// Position of the callback in its stage
    pub index: usize,
    #[source]
    pub source: anyhow::Error,
}

/// Mutable record shared by every callback of a dispatch.
#[derive(Debug, Default)]
pub struct HookContext {
    pub source_id: String,
    pub input_text: String,
    pub output_text: String,
    /// Set only while dispatching [`HookStage::StreamChunk`]
    pub chunk_text: Option<String>,
    /// Set only while dispatching [`HookStage::Error`]; clear it to suppress
    /// the failure
    pub error: Option<HookFailure>,
    pub extracted: Extracted,
    pub metadata: Metadata,
}

impl HookContext {
    pub fn new(source_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            input_text: input_text.into(),
            ..Self::default()
        }
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// The text a transforming callback should act on: the chunk during
    /// streaming, the output otherwise.
    pub fn target_text(&mut self) -> &mut String {
        match self.chunk_text {
            Some(ref mut chunk) => chunk,
            None => &mut self.output_text,
        }
    }
}

/// A registered callback.
pub type HookCallback = Box<dyn FnMut(&mut HookContext) -> anyhow::Result<()> + Send>;

/// Ordered callback registry per lifecycle stage.
#[derive(Default)]
pub struct HookPipeline {
    hooks: HashMap<HookStage, Vec<HookCallback>>,
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = HookStage::all()
            .iter()
            .map(|stage| (stage.as_str(), self.len(*stage)))
            .filter(|(_, count)| *count > 0)
            .collect();
        f.debug_struct("HookPipeline").field("hooks", &counts).finish()
    }
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback to `stage`. Registration order is execution order.
    pub fn register<F>(&mut self, stage: HookStage, callback: F)
    where
        F: FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.hooks.entry(stage).or_default().push(Box::new(callback));
        debug!(%stage, count = self.len(stage), "registered hook");
    }

    /// Number of callbacks registered for `stage`.
    pub fn len(&self, stage: HookStage) -> usize {
        self.hooks.get(&stage).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    /// Remove every callback of one stage.
    pub fn clear(&mut self, stage: HookStage) {
        self.hooks.remove(&stage);
    }

    /// Remove every callback of every stage.
    pub fn clear_all(&mut self) {
        self.hooks.clear();
    }

    /// Run the callbacks of `stage` over `ctx`.
    pub fn dispatch(&mut self, stage: HookStage, ctx: &mut HookContext) -> Result<(), HookFailure> {
        if stage == HookStage::Error {
            self.run_error_stage(ctx);
            return Ok(());
        }

        let Some(callbacks) = self.hooks.get_mut(&stage) else {
            return Ok(());
        };

        let mut failure = None;
        for (index, callback) in callbacks.iter_mut().enumerate() {
            if let Err(source) = callback(ctx) {
                failure = Some(HookFailure {
                    stage,
                    index,
                    source,
                });
                break;
            }
        }

        let Some(failure) = failure else {
            return Ok(());
        };
        warn!(%stage, index = failure.index, error = %failure.source, "hook failed");

        ctx.error = Some(failure);
        self.run_error_stage(ctx);
        match ctx.error.take() {
            Some(failure) => Err(failure),
            None => {
                debug!(%stage, "hook failure cleared by error handler");
                Ok(())
            }
        }
    }

    fn run_error_stage(&mut self, ctx: &mut HookContext) {
        let Some(callbacks) = self.hooks.get_mut(&HookStage::Error) else {
            return;
        };
        for (index, callback) in callbacks.iter_mut().enumerate() {
            if let Err(err) = callback(ctx) {
                warn!(index, error = %err, "error hook failed");
            }
        }
    }
}
