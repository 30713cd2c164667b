//! OTK - CLI entry point

mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use otk::cli::{Cli, Commands, ConfigCommands, HistoryCommands};
use otk::Config;

/// Environment variable holding the log filter (e.g. `OTK_LOG=debug`).
const LOG_ENV: &str = "OTK_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[cfg(not(tarpaulin_include))]
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Process {
            file,
            source,
            json,
            chunk_size,
            tags,
        } => commands::process::handle(
            &load_config(&cli)?,
            commands::process::ProcessArgs {
                file: file.as_deref(),
                source: source.as_deref(),
                json: *json,
                chunk_size: *chunk_size,
                tags,
            },
        ),
        Commands::Classify { source } => commands::classify::handle(&load_config(&cli)?, source),
        Commands::Chat {
            source,
            system,
            preset,
            stream,
            history,
            command,
        } => commands::chat::handle(
            &load_config(&cli)?,
            commands::chat::ChatArgs {
                source: source.as_deref(),
                system: system.as_deref(),
                preset: preset.as_deref(),
                stream: *stream,
                history: history.as_deref(),
                command,
            },
        ),
        Commands::History(HistoryCommands::Show { file }) => commands::history::handle_show(file),
        Commands::Config(ConfigCommands::Show) => {
            commands::config::handle_show(&load_config(&cli)?)
        }
        Commands::Config(ConfigCommands::Path) => {
            commands::config::handle_path(cli.config.as_deref())
        }
        Commands::Config(ConfigCommands::Init { force }) => {
            commands::config::handle_init(cli.config.as_deref(), *force)
        }
    }
}
