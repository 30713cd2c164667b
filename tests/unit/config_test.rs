//! Unit tests for config module

use tempfile::TempDir;

use otk::classify::ProcessingVariant;
use otk::extract::Multiplicity;
use otk::{Config, Error};

use crate::helpers::ScriptedTransport;

#[test]
fn default_config_has_expected_values() {
    let config = Config::default();
    assert_eq!(config.session.source_id, "llama3");
    assert_eq!(config.session.max_history, 50);
    assert!(config.session.system_message.is_none());
    assert_eq!(config.generation.preset, "balanced");
    assert!(config.classifier.builtin_rules);
    assert!(config.extraction.rules.is_empty());
    assert_eq!(config.transport.command, vec!["ollama", "run", "{source}"]);
}

#[test]
fn config_serialization_roundtrip() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).unwrap();
    let parsed: Config = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn missing_sections_use_defaults() {
    let config: Config = toml::from_str("[session]\nsource_id = \"qwen3\"\n").unwrap();
    assert_eq!(config.session.source_id, "qwen3");
    assert_eq!(config.session.max_history, 50);
    assert_eq!(config.generation.preset, "balanced");
}

#[test]
fn rules_parse_from_toml() {
    let toml_str = r#"
[[classifier.rules]]
token = "Mistral"
variant = "reasoning"

[[extraction.rules]]
label = "answer"
open = "<answer>"
close = "</answer>"
multiplicity = "single"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.classifier.rules[0].variant, ProcessingVariant::Reasoning);
    assert_eq!(config.extraction.rules[0].multiplicity, Multiplicity::Single);
    assert_eq!(
        config.build_classifier().classify("mistral:7b"),
        ProcessingVariant::Reasoning
    );
}

#[test]
fn load_from_missing_file_returns_defaults() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn load_from_rejects_invalid_values() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[generation]\ntemperature = 5.0\n").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("temperature"));
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
}

#[test]
fn load_from_rejects_empty_delimiters() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        "[[extraction.rules]]\nlabel = \"x\"\nopen = \"\"\nclose = \"]\"\n",
    )
    .unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn save_and_load_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sub").join("config.toml");
    let mut config = Config::default();
    config.session.system_message = Some("Be brief.".to_string());
    config.generation.max_tokens = Some(256);
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn build_session_applies_config() {
    let mut config = Config::default();
    config.session.system_message = Some("sys".to_string());
    config.session.max_history = 4;
    config.generation.preset = "factual".to_string();

    let transport = ScriptedTransport::new();
    let session = config.build_session(Some("qwen3"), &transport);
    assert_eq!(session.source_id(), "qwen3");
    assert_eq!(session.state().max_history(), 4);
    assert_eq!(session.options().temperature, 0.2);
    assert_eq!(session.history().len(), 1);

    let session = config.build_session(None, &transport);
    assert_eq!(session.source_id(), "llama3");
}
