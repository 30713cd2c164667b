//! Process command handler

use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

use otk::extract::ExtractionRule;
use otk::processor::ProcessedResponse;
use otk::Config;

use super::{read_input, split_chunks};

pub struct ProcessArgs<'a> {
    pub file: Option<&'a Path>,
    pub source: Option<&'a str>,
    pub json: bool,
    pub chunk_size: Option<usize>,
    pub tags: &'a [String],
}

/// Clean a response and print the content, or the full result as JSON.
#[cfg(not(tarpaulin_include))]
pub fn handle(config: &Config, args: ProcessArgs<'_>) -> Result<()> {
    let raw = read_input(args.file)?;
    let source_id = args.source.unwrap_or(&config.session.source_id);

    let mut processor = config.build_processor();
    for tag in args.tags {
        let rule = ExtractionRule::tag(tag);
        rule.validate().map_err(|e| anyhow::anyhow!("--tag {}: {}", tag, e))?;
        processor.add_rule(rule);
    }

    let response = match args.chunk_size {
        Some(size) => {
            let chunks = split_chunks(&raw, size)
                .into_iter()
                .map(Ok::<_, otk::Error>);
            let mut stream = processor.process_stream(chunks, source_id);
            let mut stdout = io::stdout().lock();
            for chunk in stream.by_ref() {
                let chunk = chunk?;
                if !args.json {
                    write!(stdout, "{}", chunk.content)?;
                    stdout.flush()?;
                }
            }
            if !args.json {
                writeln!(stdout)?;
                return Ok(());
            }
            stream
                .into_response()
                .ok_or_else(|| anyhow::anyhow!("stream ended without a response"))?
        }
        None => processor.process(&raw, source_id)?,
    };

    print_response(&response, args.json)
}

fn print_response(response: &ProcessedResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        println!("{}", response.content);
    }
    Ok(())
}
