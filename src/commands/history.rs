//! History subcommands handler

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use otk::session::{format_chat_history, HistorySerializer, JsonHistorySerializer};

/// Print a saved history file as a transcript.
pub fn handle_show(file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read history: {:?}", file))?;
    let messages = JsonHistorySerializer.load(&bytes)?;
    if messages.is_empty() {
        println!("(empty history)");
        return Ok(());
    }
    print!("{}", format_chat_history(&messages));
    Ok(())
}
