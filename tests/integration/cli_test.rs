//! End-to-end tests of the `otk` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// `otk` with a config path that does not exist, so defaults apply.
fn otk(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("otk").unwrap();
    cmd.arg("--config")
        .arg(config_path(temp.path()))
        .env("NO_COLOR", "1")
        .env_remove("OTK_LOG");
    cmd
}

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.toml")
}

#[test]
fn process_strips_reasoning_from_stdin() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["process", "-s", "deepseek-r1"])
        .write_stdin("<think>Counting.</think>\n\nThere are 3.")
        .assert()
        .success()
        .stdout("There are 3.\n");
}

#[test]
fn process_reads_file_argument() {
    let temp = TempDir::new().unwrap();
    let reply = temp.path().join("reply.txt");
    fs::write(&reply, "<reasoning>r</reasoning>Done.").unwrap();
    otk(&temp)
        .args(["process", "-s", "qwen3"])
        .arg(&reply)
        .assert()
        .success()
        .stdout("Done.\n");
}

#[test]
fn process_streaming_path_matches_complete() {
    let temp = TempDir::new().unwrap();
    let input = "Intro <think>split across\nchunks</think>\n\n\nOutro";
    for size in ["1", "3", "7"] {
        otk(&temp)
            .args(["process", "-s", "qwen3", "--chunk-size", size])
            .write_stdin(input)
            .assert()
            .success()
            .stdout("Intro\n\nOutro\n");
    }
}

#[test]
fn process_json_reports_extracted_spans() {
    let temp = TempDir::new().unwrap();
    let output = otk(&temp)
        .args(["process", "-s", "codellama", "--json"])
        .write_stdin("See:\n```rust\nfn main() {}\n```")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["content"], "See:");
    assert_eq!(value["metadata"]["variant"], "code");
    assert_eq!(value["metadata"]["code_blocks"][0]["language"], "rust");
    assert_eq!(value["extracted"]["code"][0], "rust\nfn main() {}");
}

#[test]
fn process_extra_tags() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["process", "--tag", "answer", "--json"])
        .write_stdin("Result: <answer>42</answer>")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"answer\": [\n      \"42\"\n    ]"));
}

#[test]
fn process_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["process", "/nonexistent/otk/reply.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn configured_tags_apply() {
    let temp = TempDir::new().unwrap();
    fs::write(
        config_path(temp.path()),
        "[[extraction.rules]]\nlabel = \"note\"\nopen = \"[[\"\nclose = \"]]\"\n",
    )
    .unwrap();
    otk(&temp)
        .args(["process"])
        .write_stdin("keep [[drop]] this")
        .assert()
        .success()
        .stdout("keep  this\n");
}

#[test]
fn invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    fs::write(config_path(temp.path()), "[generation]\npreset = \"chaotic\"\n").unwrap();
    otk(&temp)
        .args(["classify", "llama3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[generation].preset"));
}

#[test]
fn classify_prints_variant() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["classify", "DeepSeek-R1:14b"])
        .assert()
        .success()
        .stdout("reasoning\n");
}

#[test]
fn config_init_path_and_show() {
    let temp = TempDir::new().unwrap();
    let path = config_path(temp.path());

    otk(&temp)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(format!("{}\n", path.display()));

    otk(&temp).args(["config", "init"]).assert().success();
    assert!(path.exists());

    otk(&temp)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    otk(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[session]")
                .and(predicate::str::contains("source_id = \"llama3\"")),
        );
}

#[cfg(unix)]
#[test]
fn chat_cleans_replies_from_transport_command() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["chat", "-s", "deepseek-r1", "--", "sh", "-c"])
        .arg("cat >/dev/null; printf '<think>hm</think>\\n\\nHi there\\n'")
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout("Hi there\n");
}

#[cfg(unix)]
#[test]
fn chat_stream_mode_prints_cleaned_reply() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["chat", "-s", "qwen3", "--stream", "--", "sh", "-c"])
        .arg("cat >/dev/null; printf '<think>a\\nb</think>Line one\\nLine two\\n'")
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout("Line one\nLine two\n");
}

#[cfg(unix)]
#[test]
fn chat_rejects_unsafe_source() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("touched");
    otk(&temp)
        .args(["chat", "-s"])
        .arg(format!("x; touch {}", marker.display()))
        .args(["--", "sh", "-c", "echo {source}"])
        .write_stdin("hello\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --source"));
    assert!(!marker.exists());
}

#[cfg(unix)]
#[test]
fn chat_history_is_saved_and_resumed() {
    let temp = TempDir::new().unwrap();
    let history = temp.path().join("chats").join("chat.json");

    // The command echoes back how many user turns it received
    let script = "printf 'turns:%s\\n' \"$(grep -c '^\\[USER\\]')\"";

    otk(&temp)
        .args(["chat", "--system", "Be brief.", "--history"])
        .arg(&history)
        .args(["--", "sh", "-c", script])
        .write_stdin("first\n\nsecond\n")
        .assert()
        .success()
        .stdout("turns:1\nturns:2\n");

    otk(&temp)
        .args(["chat", "--history"])
        .arg(&history)
        .args(["--", "sh", "-c", script])
        .write_stdin("third\n")
        .assert()
        .success()
        .stdout("turns:3\n");

    otk(&temp)
        .args(["history", "show"])
        .arg(&history)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[SYSTEM]\nBe brief.\n"))
        .stdout(predicate::str::contains("[ASSISTANT]\nturns:3\n"));
}

#[cfg(unix)]
#[test]
fn chat_reports_failing_command() {
    let temp = TempDir::new().unwrap();
    otk(&temp)
        .args(["chat", "--", "sh", "-c", "cat >/dev/null; echo nope >&2; exit 2"])
        .write_stdin("hello\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}
