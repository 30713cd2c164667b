//! Multi-turn conversation state.
//!
//! A [`ConversationSession`] owns the message history, an optional system
//! message, and a [`ResponseProcessor`]. Each exchange is committed to the
//! history atomically: the user message and the cleaned assistant reply are
//! appended together once the response has been fully processed. A failed
//! transport call, a failing hook or an abandoned stream leaves the history
//! exactly as it was.

mod history;
mod message;

pub use history::{HistoryError, HistorySerializer, JsonHistorySerializer};
pub use message::{Message, Role};

use tracing::{debug, warn};

use crate::error::Result;
use crate::extract::{Extracted, REASONING_TAGS};
use crate::hooks::Metadata;
use crate::processor::{ProcessStream, ProcessedResponse, ResponseProcessor};
use crate::transport::{GenerationOptions, Transport, TransportStream};

/// Default bound on retained non-system messages.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Characters per token used by [`estimate_tokens`].
const CHARS_PER_TOKEN: usize = 4;

/// Mutable per-session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    system_message: Option<Message>,
    /// Non-system messages, oldest first
    messages: Vec<Message>,
    max_history: usize,
    last_extracted: Option<Extracted>,
    last_metadata: Option<Metadata>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            system_message: None,
            messages: Vec::new(),
            max_history: DEFAULT_MAX_HISTORY,
            last_extracted: None,
            last_metadata: None,
        }
    }
}

impl SessionState {
    pub fn system_message(&self) -> Option<&Message> {
        self.system_message.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Messages sent to the transport for a new user turn.
    fn request_with(&self, user: &Message) -> Vec<Message> {
        let keep = self.max_history.saturating_sub(1);
        let start = self.messages.len().saturating_sub(keep);

        let mut request = Vec::with_capacity(keep + 2);
        request.extend(self.system_message.iter().cloned());
        request.extend(self.messages[start..].iter().cloned());
        request.push(user.clone());
        request
    }

    fn commit(&mut self, user: Message, response: &ProcessedResponse) {
        self.messages.push(user);
        self.messages.push(Message::assistant(response.content.as_str()));
        self.evict();
        self.last_extracted = Some(response.extracted.clone());
        self.last_metadata = Some(response.metadata.clone());
        debug!(messages = self.messages.len(), "committed exchange");
    }

    /// Drop the oldest messages beyond `max_history`.
    fn evict(&mut self) {
        if self.messages.len() > self.max_history {
            let excess = self.messages.len() - self.max_history;
            self.messages.drain(..excess);
            debug!(evicted = excess, "trimmed history");
        }
    }
}

/// A conversation with one model source.
pub struct ConversationSession<T> {
    source_id: String,
    transport: T,
    processor: ResponseProcessor,
    serializer: Box<dyn HistorySerializer + Send + Sync>,
    options: GenerationOptions,
    state: SessionState,
}

impl<T: Transport> ConversationSession<T> {
    pub fn new(source_id: impl Into<String>, transport: T) -> Self {
        Self {
            source_id: source_id.into(),
            transport,
            processor: ResponseProcessor::new(),
            serializer: Box::new(JsonHistorySerializer),
            options: GenerationOptions::default(),
            state: SessionState::default(),
        }
    }

    pub fn with_system_message(mut self, content: impl Into<String>) -> Self {
        self.set_system_message(content);
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.state.max_history = max_history;
        self.state.evict();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_processor(mut self, processor: ResponseProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_serializer<S>(mut self, serializer: S) -> Self
    where
        S: HistorySerializer + Send + Sync + 'static,
    {
        self.serializer = Box::new(serializer);
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn processor(&self) -> &ResponseProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut ResponseProcessor {
        &mut self.processor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Send a prompt and return the cleaned reply.
    pub fn send(&mut self, prompt: &str) -> Result<String> {
        let user = Message::user(prompt);
        let request = self.state.request_with(&user);
        let raw = self
            .transport
            .issue(&self.source_id, &request, &self.options)?;
        let response = self.processor.process(&raw, &self.source_id)?;
        self.state.commit(user, &response);
        Ok(response.content)
    }

    /// Send a prompt and stream the cleaned reply.
    ///
    /// The exchange is recorded only when the stream is driven to its final
    /// chunk; dropping it earlier records nothing.
    pub fn send_stream(&mut self, prompt: &str) -> Result<SessionStream<'_>> {
        let user = Message::user(prompt);
        let request = self.state.request_with(&user);
        let chunks = self
            .transport
            .issue_stream(&self.source_id, &request, &self.options)?;
        let stream = self.processor.process_stream(chunks, &self.source_id);
        Ok(SessionStream {
            stream,
            state: &mut self.state,
            user: Some(user),
        })
    }

    /// Remove all messages, optionally keeping the system message.
    pub fn clear(&mut self, keep_system: bool) {
        self.state.messages.clear();
        self.state.last_extracted = None;
        self.state.last_metadata = None;
        if !keep_system {
            self.state.system_message = None;
        }
    }

    pub fn set_system_message(&mut self, content: impl Into<String>) {
        self.state.system_message = Some(Message::system(content));
    }

    pub fn clear_system_message(&mut self) {
        self.state.system_message = None;
    }

    /// Full history, system message first.
    pub fn history(&self) -> Vec<Message> {
        self.state
            .system_message
            .iter()
            .chain(self.state.messages.iter())
            .cloned()
            .collect()
    }

    pub fn last_extracted(&self) -> Option<&Extracted> {
        self.state.last_extracted.as_ref()
    }

    /// Spans captured for `label` by the last reply.
    pub fn last_extracted_for(&self, label: &str) -> Option<&[String]> {
        self.state
            .last_extracted
            .as_ref()
            .and_then(|extracted| extracted.get(label))
            .map(Vec::as_slice)
    }

    /// Reasoning blocks of the last reply, `None` if it had none.
    pub fn last_thinking(&self) -> Option<Vec<String>> {
        let extracted = self.state.last_extracted.as_ref()?;
        let thinking: Vec<String> = REASONING_TAGS
            .iter()
            .filter_map(|tag| extracted.get(*tag))
            .flatten()
            .cloned()
            .collect();
        (!thinking.is_empty()).then_some(thinking)
    }

    pub fn last_metadata(&self) -> Option<&Metadata> {
        self.state.last_metadata.as_ref()
    }

    /// Serialize the full history (system message first).
    pub fn export_history(&self) -> Result<Vec<u8>> {
        Ok(self.serializer.save(&self.history())?)
    }

    /// Replace the history with a serialized one.
    ///
    /// A leading system message becomes the session's system message; the
    /// rest is bounded by `max_history` like any other history.
    pub fn load_history(&mut self, bytes: &[u8]) -> Result<()> {
        let mut messages = self.serializer.load(bytes)?;

        let system_message = match messages.first() {
            Some(first) if first.is_system() => Some(messages.remove(0)),
            _ => None,
        };
        if messages.iter().any(Message::is_system) {
            return Err(HistoryError::Invalid(
                "system message must be the first message".to_string(),
            )
            .into());
        }

        self.state.system_message = system_message;
        self.state.messages = messages;
        self.state.last_extracted = None;
        self.state.last_metadata = None;
        self.state.evict();
        Ok(())
    }

    /// Rough token count of the full history.
    pub fn estimate_tokens(&self) -> usize {
        self.history().iter().map(|m| estimate_tokens(&m.content)).sum()
    }
}

/// Streamed reply of [`ConversationSession::send_stream`].
pub struct SessionStream<'a> {
    stream: ProcessStream<'a, TransportStream<'a>>,
    state: &'a mut SessionState,
    user: Option<Message>,
}

impl SessionStream<'_> {
    /// Whole-response view, available after the last chunk.
    pub fn response(&self) -> Option<&ProcessedResponse> {
        self.stream.response()
    }
}

impl Iterator for SessionStream<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stream.next()? {
            Ok(chunk) => {
                if chunk.is_final {
                    if let (Some(user), Some(response)) =
                        (self.user.take(), self.stream.response())
                    {
                        self.state.commit(user, response);
                    }
                }
                Some(Ok(chunk.content))
            }
            Err(err) => {
                warn!(error = %err, "stream failed, exchange not recorded");
                self.user = None;
                Some(Err(err))
            }
        }
    }
}

/// Render messages as a plain-text transcript.
pub fn format_chat_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("[{}]\n{}\n", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rough token estimate (four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Check a source identifier looks like `name[:tag]`.
///
/// Names may contain ASCII letters, digits, `_`, `-`, `.` and `/` (for
/// namespaced models); tags the same without `/`.
pub fn validate_source_id(source_id: &str) -> std::result::Result<(), String> {
    let (name, tag) = match source_id.split_once(':') {
        Some((name, tag)) => (name, Some(tag)),
        None => (source_id, None),
    };

    let valid_name = |s: &str, allow_slash: bool| {
        !s.is_empty()
            && s.chars().all(|c| {
                c.is_ascii_alphanumeric()
                    || matches!(c, '_' | '-' | '.')
                    || (allow_slash && c == '/')
            })
    };

    if !valid_name(name, true) {
        return Err(format!("invalid source name '{}'", name));
    }
    if let Some(tag) = tag {
        if !valid_name(tag, false) {
            return Err(format!("invalid tag '{}' in source '{}'", tag, source_id));
        }
    }
    Ok(())
}
