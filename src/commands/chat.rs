//! Chat command handler

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

use otk::session::validate_source_id;
use otk::transport::{CommandTransport, GenerationOptions, PRESET_NAMES};
use otk::{Config, ConversationSession};

pub struct ChatArgs<'a> {
    pub source: Option<&'a str>,
    pub system: Option<&'a str>,
    pub preset: Option<&'a str>,
    pub stream: bool,
    pub history: Option<&'a Path>,
    pub command: &'a [String],
}

/// Chat over stdin: every non-empty line is one prompt.
#[cfg(not(tarpaulin_include))]
pub fn handle(config: &Config, args: ChatArgs<'_>) -> Result<()> {
    // The source is substituted into the transport argv
    if let Some(source) = args.source {
        validate_source_id(source).map_err(|e| anyhow::anyhow!("Invalid --source: {}", e))?;
    }

    let transport = if args.command.is_empty() {
        config.build_transport()?
    } else {
        CommandTransport::from_argv(args.command)?
    };

    let mut session = config.build_session(args.source, transport);
    if let Some(name) = args.preset {
        let options = GenerationOptions::preset(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown preset '{}' (expected one of: {})",
                name,
                PRESET_NAMES.join(", ")
            )
        })?;
        session = session.with_options(options);
    }

    if let Some(path) = args.history {
        if path.exists() {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read history: {:?}", path))?;
            session.load_history(&bytes)?;
            info!(messages = session.state().messages().len(), "history loaded");
        }
    }
    // An explicit --system wins over a loaded one
    if let Some(system) = args.system {
        session.set_system_message(system);
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        exchange(&mut session, prompt, args.stream)?;

        if let Some(path) = args.history {
            save_history(&session, path)?;
        }
    }
    Ok(())
}

fn exchange(
    session: &mut ConversationSession<CommandTransport>,
    prompt: &str,
    stream: bool,
) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if stream {
        for piece in session.send_stream(prompt)? {
            write!(stdout, "{}", piece?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let reply = session.send(prompt)?;
        writeln!(stdout, "{}", reply)?;
    }
    Ok(())
}

fn save_history(session: &ConversationSession<CommandTransport>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    fs::write(path, session.export_history()?)
        .with_context(|| format!("Failed to write history: {:?}", path))
}
