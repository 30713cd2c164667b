//! Transport seam to a model backend.
//!
//! The core never talks to the network itself: a [`Transport`] turns a
//! message list into response text, either complete or as a chunk stream.
//! Errors are surfaced to the caller unmodified and never retried.

mod command;

pub use command::CommandTransport;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::session::Message;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Chunk stream returned by [`Transport::issue_stream`].
pub type TransportStream<'a> = Box<dyn Iterator<Item = TransportResult<String>> + 'a>;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("Exit code {code}: {stderr}")]
    ExitCode { code: i32, stderr: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Issues requests to a model backend.
pub trait Transport {
    /// Send `messages` and return the complete response text.
    fn issue(
        &self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<String>;

    /// Send `messages` and return the response as a chunk stream.
    ///
    /// The default delivers the complete response as a single chunk.
    fn issue_stream<'a>(
        &'a self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<TransportStream<'a>> {
        let text = self.issue(source_id, messages, options)?;
        Ok(Box::new(std::iter::once(Ok(text))))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn issue(
        &self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<String> {
        (**self).issue(source_id, messages, options)
    }

    fn issue_stream<'a>(
        &'a self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<TransportStream<'a>> {
        (**self).issue_stream(source_id, messages, options)
    }
}

/// Names accepted by [`GenerationOptions::preset`].
pub const PRESET_NAMES: [&str; 5] = ["creative", "factual", "balanced", "code", "conversational"];

/// Sampling options passed through to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    /// Upper bound on generated tokens; backend default when unset
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop: Vec<String>,
    /// Extra backend-specific options, merged last
    pub custom: BTreeMap<String, Value>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            max_tokens: None,
            stop: Vec::new(),
            custom: BTreeMap::new(),
        }
    }
}

impl GenerationOptions {
    /// High-variety sampling.
    pub fn creative() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.95,
            ..Self::default()
        }
    }

    /// Low-variety, repetition-averse sampling.
    pub fn factual() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.5,
            repeat_penalty: 1.2,
            ..Self::default()
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }

    /// Tuned for code generation; stops after a closed fence.
    pub fn code() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            repeat_penalty: 1.05,
            stop: vec!["```\n\n".to_string()],
            ..Self::default()
        }
    }

    pub fn conversational() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.92,
            repeat_penalty: 1.1,
            ..Self::default()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "creative" => Some(Self::creative()),
            "factual" => Some(Self::factual()),
            "balanced" => Some(Self::balanced()),
            "code" => Some(Self::code()),
            "conversational" => Some(Self::conversational()),
            _ => None,
        }
    }

    /// Render as a backend option map (`num_predict`, `stop`, custom keys).
    pub fn to_options(&self) -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("temperature".into(), Value::from(self.temperature));
        options.insert("top_p".into(), Value::from(self.top_p));
        options.insert("top_k".into(), Value::from(self.top_k));
        options.insert("repeat_penalty".into(), Value::from(self.repeat_penalty));
        if let Some(max_tokens) = self.max_tokens {
            options.insert("num_predict".into(), Value::from(max_tokens));
        }
        if !self.stop.is_empty() {
            options.insert("stop".into(), Value::from(self.stop.clone()));
        }
        for (key, value) in &self.custom {
            options.insert(key.clone(), value.clone());
        }
        options
    }

    /// Check values are in range.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature must be within 0.0..=2.0, got {}", self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(format!("top_p must be within 0.0..=1.0, got {}", self.top_p));
        }
        if self.repeat_penalty <= 0.0 {
            return Err(format!("repeat_penalty must be positive, got {}", self.repeat_penalty));
        }
        if self.max_tokens == Some(0) {
            return Err("max_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}
