//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

use crate::classify::ClassificationRule;
use crate::extract::ExtractionRule;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Conversation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model/backend identifier used when none is given on the command line
    #[serde(default = "default_source_id")]
    pub source_id: String,
    /// Maximum retained non-system messages
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

pub fn default_source_id() -> String {
    "llama3".to_string()
}

pub fn default_max_history() -> usize {
    crate::session::DEFAULT_MAX_HISTORY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_id: default_source_id(),
            max_history: default_max_history(),
            system_message: None,
        }
    }
}

/// Sampling options: a named preset plus per-field overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Replaces the preset's stop sequences when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

pub fn default_preset() -> String {
    "balanced".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            temperature: None,
            top_p: None,
            top_k: None,
            repeat_penalty: None,
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// Source classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Start from the well-known model families
    #[serde(default = "default_builtin_rules")]
    pub builtin_rules: bool,
    /// Extra rules, checked after the built-in ones
    #[serde(default)]
    pub rules: Vec<ClassificationRule>,
}

pub fn default_builtin_rules() -> bool {
    true
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            builtin_rules: default_builtin_rules(),
            rules: Vec::new(),
        }
    }
}

/// Custom extraction rules, applied to every response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub rules: Vec<ExtractionRule>,
}

/// Command used by `otk chat` to reach a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Program and arguments; `{source}` is replaced with the source id
    #[serde(default = "default_transport_command")]
    pub command: Vec<String>,
}

pub fn default_transport_command() -> Vec<String> {
    vec!["ollama".to_string(), "run".to_string(), "{source}".to_string()]
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command: default_transport_command(),
        }
    }
}
