//! Unit tests for the response processor

use std::sync::{Arc, Mutex};

use serde_json::json;

use otk::extract::ExtractionRule;
use otk::hooks::{presets, HookContext, HookStage};
use otk::processor::{auto_clean_response, CodeBlock, ProcessedChunk};
use otk::transport::TransportError;
use otk::{Error, ResponseProcessor};

fn collect_stream(
    processor: &mut ResponseProcessor,
    chunks: &[&str],
    source: &str,
) -> (Vec<ProcessedChunk>, otk::ProcessedResponse) {
    let owned: Vec<Result<String, Error>> = chunks.iter().map(|c| Ok(c.to_string())).collect();
    let mut stream = processor.process_stream(owned, source);
    let produced: Vec<ProcessedChunk> = stream.by_ref().map(|c| c.unwrap()).collect();
    let response = stream.into_response().expect("response after final chunk");
    (produced, response)
}

#[test]
fn reasoning_response_is_cleaned() {
    let mut processor = ResponseProcessor::new();
    let response = processor
        .process("<think>Let me count.</think>\n\nThere are 3.", "deepseek-r1:7b")
        .unwrap();

    assert_eq!(response.content, "There are 3.");
    assert_eq!(response.thinking(), vec!["Let me count."]);
    assert_eq!(response.metadata["variant"], json!("reasoning"));
    assert_eq!(response.metadata["source_id"], json!("deepseek-r1:7b"));
    assert_eq!(response.metadata["thinking_blocks_count"], json!(1));
    assert_eq!(response.raw_content, "<think>Let me count.</think>\n\nThere are 3.");
}

#[test]
fn standard_source_keeps_tags() {
    let mut processor = ResponseProcessor::new();
    let response = processor.process("<think>x</think> y", "llama3").unwrap();
    assert_eq!(response.content, "<think>x</think> y");
    assert!(response.extracted.is_empty());
    assert_eq!(response.metadata["variant"], json!("standard"));
}

#[test]
fn code_source_collects_blocks() {
    let mut processor = ResponseProcessor::new();
    let raw = "Here:\n```python\nprint(1)\n```\nand\n```\nplain\n```";
    let response = processor.process(raw, "codellama").unwrap();

    assert_eq!(response.content, "Here:\n\nand");
    assert_eq!(response.extracted_for("code").len(), 2);
    assert_eq!(response.metadata["code_blocks_count"], json!(2));
    assert_eq!(
        response.metadata["code_blocks"],
        json!([
            {"language": "python", "code": "print(1)"},
            {"language": "text", "code": "plain"}
        ])
    );
}

#[test]
fn code_block_parse_needs_word_info_string() {
    assert_eq!(
        CodeBlock::parse("let x = 1;\nlet y = 2;"),
        CodeBlock {
            language: "text".to_string(),
            code: "let x = 1;\nlet y = 2;".to_string()
        }
    );
}

#[test]
fn custom_rules_apply_to_every_variant() {
    let mut processor = ResponseProcessor::new().with_rules(vec![ExtractionRule::tag("answer")]);
    let response = processor
        .process("<think>hmm</think>The <answer>42</answer> it is", "qwen3")
        .unwrap();
    assert_eq!(response.content, "The  it is");
    assert_eq!(response.extracted_for("answer"), ["42"]);
    assert_eq!(response.extracted_for("think"), ["hmm"]);
}

#[test]
fn per_call_rules_do_not_persist() {
    let mut processor = ResponseProcessor::new();
    let extra = [ExtractionRule::tag("note")];
    let first = processor.process_with_rules("a <note>n</note>", "llama3", &extra).unwrap();
    assert_eq!(first.content, "a");
    let second = processor.process("a <note>n</note>", "llama3").unwrap();
    assert_eq!(second.content, "a <note>n</note>");
}

#[test]
fn hooks_see_each_stage_in_order() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let mut processor = ResponseProcessor::new();
    for stage in [
        HookStage::PreProcess,
        HookStage::PreClean,
        HookStage::PostClean,
        HookStage::PostProcess,
    ] {
        let stages = Arc::clone(&stages);
        processor.register_hook(stage, move |_ctx: &mut HookContext| {
            stages.lock().unwrap().push(stage);
            Ok(())
        });
    }
    processor.process("text", "llama3").unwrap();
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            HookStage::PreProcess,
            HookStage::PreClean,
            HookStage::PostClean,
            HookStage::PostProcess
        ]
    );
}

#[test]
fn pre_clean_hook_rewrites_input() {
    let mut processor = ResponseProcessor::new();
    processor.register_hook(HookStage::PreClean, |ctx: &mut HookContext| {
        ctx.input_text = ctx.input_text.replace("[[", "<think>").replace("]]", "</think>");
        Ok(())
    });
    let response = processor.process("[[hidden]] shown", "deepseek-r1").unwrap();
    assert_eq!(response.content, "shown");
    assert_eq!(response.raw_content, "[[hidden]] shown");
}

#[test]
fn failing_hook_surfaces_as_error() {
    let mut processor = ResponseProcessor::new();
    processor.register_hook(HookStage::PostClean, |_ctx: &mut HookContext| {
        anyhow::bail!("rejected")
    });
    let err = processor.process("text", "llama3").unwrap_err();
    assert!(err.is_hook());
    assert!(err.to_string().contains("rejected"));
}

#[test]
fn hook_metadata_is_not_overwritten_by_processor_keys() {
    let mut processor = ResponseProcessor::new();
    processor.register_hook(HookStage::PreProcess, |ctx: &mut HookContext| {
        ctx.set_metadata("source_id", "alias");
        Ok(())
    });
    let response = processor.process("<think>x</think>y", "deepseek-r1").unwrap();

    assert_eq!(response.metadata["source_id"], json!("alias"));
    assert_eq!(response.metadata["variant"], json!("reasoning"));
    assert_eq!(response.metadata["thinking_blocks_count"], json!(1));
}

#[test]
fn final_stream_chunk_sees_all_captures() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut processor = ResponseProcessor::new();
    processor.register_hook(HookStage::StreamChunk, move |ctx: &mut HookContext| {
        let count = ctx.extracted.get("think").map_or(0, Vec::len);
        sink.lock().unwrap().push(count);
        Ok(())
    });

    let (chunks, _) = collect_stream(&mut processor, &["<think>a</think>", "b"], "qwen3");

    assert_eq!(chunks.len(), 3);
    assert_eq!(*seen.lock().unwrap(), vec![1, 1, 1]);
}

#[test]
fn stream_yields_one_chunk_per_input_plus_final() {
    let mut processor = ResponseProcessor::new();
    let (chunks, response) =
        collect_stream(&mut processor, &["Hi <thi", "nk>hidden</th", "ink> there"], "qwen3");

    assert_eq!(chunks.len(), 4);
    assert!(chunks[..3].iter().all(|c| !c.is_final));
    assert!(chunks[3].is_final);

    let content: String = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(content, "Hi  there");
    assert!(!content.contains("hidden"));
    assert_eq!(response.content, content);
    assert_eq!(response.thinking(), vec!["hidden"]);
    assert_eq!(response.raw_content, "Hi <think>hidden</think> there");
}

#[test]
fn stream_matches_complete_processing() {
    let raw = "<think>a\n\nb</think>\n\n\nAnswer:\n```rust\nx\n```\ndone <think>dangling";
    let mut processor = ResponseProcessor::new().with_rules(vec![ExtractionRule::code_fence()]);
    let complete = processor.process(raw, "deepseek-r1").unwrap();
    let (_, streamed) = collect_stream(
        &mut processor,
        &[&raw[..5], &raw[5..30], &raw[30..]],
        "deepseek-r1",
    );

    assert_eq!(streamed.content, complete.content);
    assert_eq!(streamed.extracted, complete.extracted);
    assert_eq!(streamed.metadata, complete.metadata);
}

#[test]
fn stream_chunk_hooks_transform_emitted_text() {
    let mut processor = ResponseProcessor::new();
    processor.register_hook(HookStage::StreamChunk, presets::uppercase());
    let (chunks, response) = collect_stream(&mut processor, &["hello ", "world"], "llama3");
    let content: String = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(content, "HELLO WORLD");
    assert_eq!(response.content, "HELLO WORLD");
}

#[test]
fn stream_stops_after_transport_error() {
    let mut processor = ResponseProcessor::new();
    let chunks: Vec<Result<String, Error>> = vec![
        Ok("partial".to_string()),
        Err(TransportError::Request("connection reset".to_string()).into()),
        Ok("never".to_string()),
    ];
    let mut stream = processor.process_stream(chunks, "llama3");
    assert_eq!(stream.next().unwrap().unwrap().content, "partial");
    assert!(stream.next().unwrap().is_err());
    assert!(stream.next().is_none());
    assert!(stream.response().is_none());
}

#[test]
fn empty_stream_still_finishes() {
    let mut processor = ResponseProcessor::new();
    let (chunks, response) = collect_stream(&mut processor, &[], "llama3");
    assert_eq!(chunks, vec![ProcessedChunk { content: String::new(), is_final: true }]);
    assert_eq!(response.content, "");
}

#[test]
fn auto_clean_uses_builtin_rules_only() {
    assert_eq!(auto_clean_response("<think>x</think>Hello", "deepseek-r1"), "Hello");
    assert_eq!(auto_clean_response("<think>x</think>Hello", "llama3"), "<think>x</think>Hello");
}
