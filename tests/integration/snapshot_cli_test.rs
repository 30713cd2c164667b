//! CLI output snapshot tests
//!
//! Tests the actual CLI binary output for reproducibility.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Helper to run the otk CLI with defaults-only config and capture stdout
fn run_otk(temp: &TempDir, args: &[&str], stdin: &str) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_otk"))
        .arg("--config")
        .arg(temp.path().join("config.toml"))
        .args(args)
        .env("NO_COLOR", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute otk");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(stdin.as_bytes())
        .expect("Failed to write stdin");
    let output = child.wait_with_output().expect("Failed to wait for otk");

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

#[test]
fn snapshot_process_json_reasoning() {
    let temp = TempDir::new().unwrap();
    let (stdout, _, exit_code) = run_otk(
        &temp,
        &["process", "-s", "deepseek-r1", "--json"],
        "<think>plan</think>Done.",
    );
    assert_eq!(exit_code, 0);
    insta::assert_snapshot!(stdout, @r#"
    {
      "content": "Done.",
      "extracted": {
        "reasoning": [],
        "think": [
          "plan"
        ],
        "thought": []
      },
      "metadata": {
        "source_id": "deepseek-r1",
        "thinking_blocks_count": 1,
        "variant": "reasoning"
      },
      "raw_content": "<think>plan</think>Done."
    }
    "#);
}

#[test]
fn snapshot_process_whitespace_normalization() {
    let temp = TempDir::new().unwrap();
    let input = "First line   \n\n\n\n<think>gone</think>\n\n    indented\n\n\n\nLast";
    let (stdout, _, exit_code) = run_otk(&temp, &["process", "-s", "qwen3"], input);
    assert_eq!(exit_code, 0);
    insta::assert_snapshot!(stdout.replace(' ', "·"), @r"
    First·line

    ····indented

    Last
    ");
}

#[test]
fn snapshot_classify_table() {
    let temp = TempDir::new().unwrap();
    let mut lines = Vec::new();
    for source in [
        "deepseek-r1:14b",
        "qwen2.5:7b",
        "codellama",
        "starcoder2",
        "llama3",
        "mistral",
    ] {
        let (stdout, _, _) = run_otk(&temp, &["classify", source], "");
        lines.push(format!("{:<16} {}", source, stdout));
    }
    insta::assert_snapshot!(lines.join("\n"), @r"
    deepseek-r1:14b  reasoning
    qwen2.5:7b       reasoning
    codellama        code
    starcoder2       code
    llama3           standard
    mistral          standard
    ");
}

#[test]
fn snapshot_history_show() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("chat.json");
    fs::write(
        &path,
        r#"{"messages": [
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "2+2?"},
            {"role": "assistant", "content": "4"}
        ]}"#,
    )
    .unwrap();

    let (stdout, _, exit_code) = run_otk(&temp, &["history", "show", path.to_str().unwrap()], "");
    assert_eq!(exit_code, 0);
    insta::assert_snapshot!(stdout, @r"
    [SYSTEM]
    Be brief.

    [USER]
    2+2?

    [ASSISTANT]
    4
    ");
}
