//! Transport that runs a local command per request.
//!
//! The conversation transcript is written to the command's stdin and its
//! stdout is the response, e.g. `ollama run {source}`. The placeholder
//! `{source}` in any argument is replaced with the source identifier, and
//! the rendered generation options are passed as JSON in `OTK_OPTIONS`.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::{GenerationOptions, Transport, TransportError, TransportResult, TransportStream};
use crate::session::{format_chat_history, Message};

/// Placeholder replaced with the source identifier in command arguments.
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// Environment variable carrying the rendered generation options.
pub const OPTIONS_ENV: &str = "OTK_OPTIONS";

#[derive(Debug, Clone)]
pub struct CommandTransport {
    program: String,
    args: Vec<String>,
}

impl CommandTransport {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a full argv (`["ollama", "run", "{source}"]`).
    pub fn from_argv(argv: &[String]) -> TransportResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TransportError::NotAvailable("empty transport command".to_string()))?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(
        &self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<(Child, JoinHandle<std::io::Result<()>>)> {
        let mut cmd = Command::new(&self.program);
        cmd.args(
            self.args
                .iter()
                .map(|arg| arg.replace(SOURCE_PLACEHOLDER, source_id)),
        );
        let options = serde_json::Value::Object(options.to_options()).to_string();
        cmd.env(OPTIONS_ENV, options);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(
            program = %self.program,
            source_id,
            messages = messages.len(),
            "spawning transport command"
        );
        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                TransportError::NotAvailable(format!("{} not found in PATH", self.program))
            }
            _ => TransportError::Io(e),
        })?;

        // Write from a separate thread so a chatty child cannot deadlock on
        // a full stdout pipe while we are still writing.
        let transcript = format_chat_history(messages);
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(transcript.as_bytes())?;
            }
            Ok(())
        });
        Ok((child, writer))
    }
}

fn join_writer(writer: JoinHandle<std::io::Result<()>>) -> TransportResult<()> {
    match writer.join() {
        Ok(result) => match result {
            // The command may exit without reading all of stdin
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            other => other.map_err(TransportError::Io),
        },
        Err(_) => Err(TransportError::Request("stdin writer panicked".to_string())),
    }
}

impl Transport for CommandTransport {
    fn issue(
        &self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<String> {
        let (child, writer) = self.spawn(source_id, messages, options)?;
        let output = child.wait_with_output()?;
        join_writer(writer)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(TransportError::ExitCode {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn issue_stream<'a>(
        &'a self,
        source_id: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> TransportResult<TransportStream<'a>> {
        let (mut child, writer) = self.spawn(source_id, messages, options)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Request("command stdout unavailable".to_string()))?;

        // Drain stderr while stdout is read so the child never blocks on it
        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || -> Vec<u8> {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            buf
        });

        Ok(Box::new(CommandStream {
            child: Some(child),
            writer: Some(writer),
            stderr_reader: Some(stderr_reader),
            stdout: BufReader::new(stdout),
        }))
    }
}

/// Line-by-line stream over a running command's stdout.
///
/// Lines are yielded with their original terminator; invalid UTF-8 is
/// decoded lossily, as in [`CommandTransport::issue`].
struct CommandStream {
    child: Option<Child>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
    stderr_reader: Option<JoinHandle<Vec<u8>>>,
    stdout: BufReader<ChildStdout>,
}

impl CommandStream {
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = Vec::new();
        match self.stdout.read_until(b'\n', &mut line)? {
            0 => Ok(None),
            _ => Ok(Some(String::from_utf8_lossy(&line).into_owned())),
        }
    }

    fn collect_stderr(&mut self) -> String {
        let bytes = self
            .stderr_reader
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn finish(&mut self) -> Option<TransportResult<String>> {
        let mut child = self.child.take()?;
        if let Some(writer) = self.writer.take() {
            if let Err(e) = join_writer(writer) {
                let _ = child.kill();
                let _ = child.wait();
                return Some(Err(e));
            }
        }
        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => return Some(Err(TransportError::Io(e))),
        };
        let stderr = self.collect_stderr();
        if status.success() {
            None
        } else {
            Some(Err(TransportError::ExitCode {
                code: status.code().unwrap_or(-1),
                stderr,
            }))
        }
    }
}

impl Iterator for CommandStream {
    type Item = TransportResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;
        match self.read_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => self.finish(),
            Err(e) => {
                self.kill();
                Some(Err(TransportError::Io(e)))
            }
        }
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        self.kill();
    }
}
