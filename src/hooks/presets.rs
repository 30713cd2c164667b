//! Ready-made hook callbacks.
//!
//! Transforming presets act on [`HookContext::target_text`], so the same
//! callback works on whole responses (`PostClean`/`PostProcess`) and on
//! streamed chunks (`StreamChunk`).

use tracing::info;

use super::HookContext;

/// Replacement text used by [`keyword_filter`].
pub const FILTERED_MARKER: &str = "[FILTERED]";

/// Characters of input/output shown by [`log_interaction`].
const LOG_PREVIEW_CHARS: usize = 50;

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}

/// Upper-case the target text.
pub fn uppercase() -> impl FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static {
    |ctx: &mut HookContext| {
        let text = ctx.target_text();
        *text = text.to_uppercase();
        Ok(())
    }
}

/// Log a short preview of the input and output.
pub fn log_interaction() -> impl FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static {
    |ctx: &mut HookContext| {
        info!(
            source_id = %ctx.source_id,
            input = %preview(&ctx.input_text),
            output = %preview(&ctx.output_text),
            "response hook"
        );
        Ok(())
    }
}

/// Cut the target text to `max_chars` characters, appending `...` when cut.
pub fn length_limiter(
    max_chars: usize,
) -> impl FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static {
    move |ctx: &mut HookContext| {
        let text = ctx.target_text();
        if let Some((cut, _)) = text.char_indices().nth(max_chars) {
            text.truncate(cut);
            text.push_str("...");
        }
        Ok(())
    }
}

/// Replace every occurrence of each keyword with `[FILTERED]`.
pub fn keyword_filter<I, S>(
    keywords: I,
) -> impl FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(Into::into)
        .filter(|k| !k.is_empty())
        .collect();
    move |ctx: &mut HookContext| {
        let text = ctx.target_text();
        for keyword in &keywords {
            if text.contains(keyword.as_str()) {
                *text = text.replace(keyword.as_str(), FILTERED_MARKER);
            }
        }
        Ok(())
    }
}

/// Prepend `prefix` to the target text.
pub fn add_prefix(
    prefix: impl Into<String>,
) -> impl FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static {
    let prefix = prefix.into();
    move |ctx: &mut HookContext| {
        ctx.target_text().insert_str(0, &prefix);
        Ok(())
    }
}

/// Append `suffix` to the target text.
pub fn add_suffix(
    suffix: impl Into<String>,
) -> impl FnMut(&mut HookContext) -> anyhow::Result<()> + Send + 'static {
    let suffix = suffix.into();
    move |ctx: &mut HookContext| {
        ctx.target_text().push_str(&suffix);
        Ok(())
    }
}
