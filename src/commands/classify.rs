//! Classify command handler

use anyhow::Result;

use otk::Config;

/// Print the processing variant for `source`.
pub fn handle(config: &Config, source: &str) -> Result<()> {
    let variant = config.build_classifier().classify(source);
    println!("{}", variant);
    Ok(())
}
