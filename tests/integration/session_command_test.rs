//! Sessions driven through a real transport command

#![cfg(unix)]

use otk::hooks::{presets, HookStage};
use otk::transport::{CommandTransport, GenerationOptions};
use otk::{ConversationSession, ResponseProcessor};

fn sh(script: &str) -> CommandTransport {
    CommandTransport::new("sh", vec!["-c".to_string(), script.to_string()])
}

#[test]
fn options_reach_the_command_environment() {
    let transport = sh("cat >/dev/null; printf '%s' \"$OTK_OPTIONS\"");
    let mut session = ConversationSession::new("llama3", transport)
        .with_options(GenerationOptions::code());

    let reply = session.send("hi").unwrap();
    let options: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(options["temperature"], serde_json::json!(0.2));
    assert_eq!(options["stop"][0], "```\n\n");
}

#[test]
fn source_placeholder_is_substituted() {
    let transport = CommandTransport::new(
        "sh",
        vec!["-c".to_string(), "cat >/dev/null; echo model={source}".to_string()],
    );
    let mut session = ConversationSession::new("qwen3:8b", transport);
    assert_eq!(session.send("hi").unwrap(), "model=qwen3:8b");
}

#[test]
fn streamed_lines_are_cleaned_and_hooked() {
    let transport = sh("cat >/dev/null; printf '<think>\\nplanning\\n</think>\\nalpha\\nbeta\\n'");
    let mut processor = ResponseProcessor::new();
    processor.register_hook(HookStage::StreamChunk, presets::uppercase());
    let mut session = ConversationSession::new("deepseek-r1", transport).with_processor(processor);

    let text: String = session
        .send_stream("go")
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
        .concat();

    assert_eq!(text, "ALPHA\nBETA");
    assert_eq!(session.last_thinking(), Some(vec!["planning".to_string()]));
    assert_eq!(session.history()[1].content, "ALPHA\nBETA");
}

#[test]
fn stream_error_is_not_recorded() {
    let transport = sh("cat >/dev/null; echo partial; exit 4");
    let mut session = ConversationSession::new("llama3", transport);

    let results: Vec<_> = session.send_stream("go").unwrap().collect();
    assert!(results.iter().any(Result::is_err));
    assert!(session.history().is_empty());
}
