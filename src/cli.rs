//! CLI definitions for OTK
//!
//! This module contains the clap CLI structure definitions, separated from main.rs
//! so they can be accessed by xtask for documentation generation (man pages, markdown).

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string: package version plus git SHA for dev builds.
#[cfg(not(feature = "release"))]
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_GIT_SHA"), ")");

/// Version string: package version only for release builds.
#[cfg(feature = "release")]
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build clap styles.
///
/// - Green: headers, usage, command names
/// - White: descriptions, placeholders
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .valid(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "otk")]
#[command(about = "[ OTK ] - normalize model responses, extract thinking/code/tagged content")]
#[command(
    long_about = "OTK - Model response toolkit.

OTK cleans raw language-model output: reasoning blocks (<think>, <reasoning>,
<thought>), fenced code and custom tagged fields are pulled out of the text,
and the remaining answer is returned with normalized whitespace. Streams are
cleaned incrementally, even when a tag is split across chunks.

QUICK START:
    otk process -s deepseek-r1 reply.txt     Clean a saved response
    cat reply.txt | otk process --json       Clean stdin, print JSON
    otk classify qwen2.5:7b                  Show the processing variant
    otk chat -s llama3                       Chat through `ollama run`

CONFIGURATION:
    otk config init                          Write ~/.config/otk/config.toml
    otk config show                          Print the effective config"
)]
#[command(version = VERSION)]
#[command(styles = build_cli_styles())]
pub struct Cli {
    /// Use this config file instead of ~/.config/otk/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean a model response
    #[command(long_about = "Clean a model response read from a file or stdin.

The source identifier picks the processing variant: reasoning models get
their thinking blocks removed, code models get code blocks collected.
Custom tags from the config (and --tag) are extracted for every source.

EXAMPLES:
    otk process -s deepseek-r1 reply.txt           Print the cleaned answer
    otk process -s codellama --json reply.txt      Print the full result as JSON
    otk process -s qwen3 --chunk-size 16 < r.txt   Clean through the streaming path
    otk process --tag answer reply.txt             Also extract <answer>...</answer>")]
    Process {
        /// Response file (reads stdin when omitted)
        #[arg(help = "Response file (reads stdin when omitted)")]
        file: Option<PathBuf>,
        /// Source identifier (defaults to [session].source_id)
        #[arg(long, short, help = "Source identifier, e.g. a model name")]
        source: Option<String>,
        /// Print the full result as JSON
        #[arg(long, help = "Print content, extracted spans and metadata as JSON")]
        json: bool,
        /// Feed the input through the streaming path in chunks of N characters
        #[arg(long, value_name = "N", help = "Process as a stream of N-character chunks")]
        chunk_size: Option<usize>,
        /// Extra angle-bracket tags to extract
        #[arg(long = "tag", value_name = "NAME", help = "Extract <NAME>...</NAME> as well")]
        tags: Vec<String>,
    },

    /// Show the processing variant for a source identifier
    #[command(long_about = "Show the processing variant for a source identifier.

Rules are matched as lower-cased substrings in registration order; the first
match wins and anything unmatched is 'standard'.

EXAMPLES:
    otk classify deepseek-r1:14b     reasoning
    otk classify codellama           code
    otk classify llama3              standard")]
    Classify {
        /// Source identifier
        #[arg(help = "Source identifier, e.g. a model name")]
        source: String,
    },

    /// Chat with a model, one prompt per stdin line
    #[command(long_about = "Chat with a model, one prompt per stdin line.

Each prompt is sent with the conversation so far through the transport
command ([transport].command, default `ollama run {source}`, or the command
after --). Replies are cleaned before they are printed and stored.

EXAMPLES:
    otk chat -s deepseek-r1                        Chat through ollama
    otk chat -s llama3 --stream                    Print replies as they arrive
    otk chat --history chat.json                   Resume and save a conversation
    otk chat -s mock -- sh -c 'echo hello'         Use a custom command")]
    Chat {
        /// Source identifier (defaults to [session].source_id)
        #[arg(long, short, help = "Source identifier, e.g. a model name")]
        source: Option<String>,
        /// System message for the conversation
        #[arg(long, help = "System message for the conversation")]
        system: Option<String>,
        /// Generation preset (creative, factual, balanced, code, conversational)
        #[arg(long, help = "Generation preset")]
        preset: Option<String>,
        /// Stream replies
        #[arg(long, help = "Print replies as they arrive")]
        stream: bool,
        /// History file to load before and save after each exchange
        #[arg(long, value_name = "FILE", help = "Load and save the conversation here")]
        history: Option<PathBuf>,
        /// Transport command overriding [transport].command
        #[arg(last = true, help = "Transport command and arguments (after --)")]
        command: Vec<String>,
    },

    /// Inspect saved conversation histories
    #[command(subcommand)]
    History(HistoryCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Print a saved history as a transcript
    Show {
        /// History file written by `otk chat --history`
        #[arg(help = "History JSON file")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
