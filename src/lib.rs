//! OTK - model response toolkit
//!
//! Cleans raw language-model output: reasoning blocks, fenced code and
//! custom tagged spans are extracted, the residual text is whitespace
//! normalized, and the same result is produced for complete responses and
//! for streams split at arbitrary points. Hooks run around every stage and a
//! conversation session ties processing to a pluggable transport.

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod processor;
pub mod session;
pub mod transport;

pub use classify::{ProcessingVariant, ResponseClassifier};
pub use config::Config;
pub use error::{Error, Result};
pub use extract::{extract, ExtractionRule, IncrementalExtractor};
pub use hooks::{HookContext, HookPipeline, HookStage};
pub use processor::{ProcessedChunk, ProcessedResponse, ResponseProcessor};
pub use session::{ConversationSession, Message, Role};
pub use transport::{CommandTransport, GenerationOptions, Transport};
