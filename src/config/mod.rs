//! Configuration management for OTK

mod io;
mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::classify::ResponseClassifier;
use crate::processor::ResponseProcessor;
use crate::session::{validate_source_id, ConversationSession};
use crate::transport::{CommandTransport, GenerationOptions, Transport, PRESET_NAMES};

impl Config {
    /// Get the config file path (~/.config/otk/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        io::config_path()
    }

    /// Get the config directory path (~/.config/otk)
    pub fn config_dir() -> Result<PathBuf> {
        io::config_dir()
    }

    /// Load configuration from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        io::load_from(&io::config_path()?)
    }

    /// Load configuration from an explicit path, or return defaults if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        io::load_from(path)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        io::save_to(self, &io::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        io::save_to(self, path)
    }

    /// Check every section for values the library would reject
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |message: String| crate::Error::Config(message);

        validate_source_id(&self.session.source_id)
            .map_err(|e| invalid(format!("[session].source_id: {}", e)))?;

        if GenerationOptions::preset(&self.generation.preset).is_none() {
            return Err(invalid(format!(
                "[generation].preset '{}' is unknown (expected one of: {})",
                self.generation.preset,
                PRESET_NAMES.join(", ")
            )));
        }
        self.generation_options()
            .validate()
            .map_err(|e| invalid(format!("[generation]: {}", e)))?;

        for rule in &self.classifier.rules {
            if rule.token.trim().is_empty() {
                return Err(invalid("[classifier.rules]: token must not be empty".to_string()));
            }
        }

        for rule in &self.extraction.rules {
            rule.validate().map_err(|e| invalid(format!("[extraction.rules]: {}", e)))?;
        }

        if self.transport.command.is_empty() {
            return Err(invalid("[transport].command must not be empty".to_string()));
        }
        Ok(())
    }

    /// Generation options: the preset with configured overrides applied
    pub fn generation_options(&self) -> GenerationOptions {
        let generation = &self.generation;
        let mut options = GenerationOptions::preset(&generation.preset).unwrap_or_default();
        if let Some(temperature) = generation.temperature {
            options.temperature = temperature;
        }
        if let Some(top_p) = generation.top_p {
            options.top_p = top_p;
        }
        if let Some(top_k) = generation.top_k {
            options.top_k = top_k;
        }
        if let Some(repeat_penalty) = generation.repeat_penalty {
            options.repeat_penalty = repeat_penalty;
        }
        if generation.max_tokens.is_some() {
            options.max_tokens = generation.max_tokens;
        }
        if !generation.stop.is_empty() {
            options.stop = generation.stop.clone();
        }
        options
    }

    /// Classifier from the `[classifier]` section
    pub fn build_classifier(&self) -> ResponseClassifier {
        let mut classifier = if self.classifier.builtin_rules {
            ResponseClassifier::with_defaults()
        } else {
            ResponseClassifier::new()
        };
        for rule in &self.classifier.rules {
            classifier.register_rule(rule.token.as_str(), rule.variant);
        }
        classifier
    }

    /// Processor with the configured classifier and extraction rules
    pub fn build_processor(&self) -> ResponseProcessor {
        debug!(
            classifier_rules = self.classifier.rules.len(),
            extraction_rules = self.extraction.rules.len(),
            "building processor from config"
        );
        ResponseProcessor::with_classifier(self.build_classifier())
            .with_rules(self.extraction.rules.clone())
    }

    /// Transport from the `[transport]` section
    pub fn build_transport(&self) -> Result<CommandTransport> {
        Ok(CommandTransport::from_argv(&self.transport.command)?)
    }

    /// Session for `source_id` (or the configured default) over `transport`
    pub fn build_session<T: Transport>(
        &self,
        source_id: Option<&str>,
        transport: T,
    ) -> ConversationSession<T> {
        let source_id = source_id.unwrap_or(&self.session.source_id);
        let mut session = ConversationSession::new(source_id, transport)
            .with_max_history(self.session.max_history)
            .with_options(self.generation_options())
            .with_processor(self.build_processor());
        if let Some(system) = &self.session.system_message {
            session.set_system_message(system.as_str());
        }
        session
    }
}
