//! History serialization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Message;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to parse history: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid history: {0}")]
    Invalid(String),
}

/// Turns a message list into bytes and back.
///
/// Implementations only need round-trip fidelity of [`Message`] fields.
pub trait HistorySerializer {
    fn save(&self, messages: &[Message]) -> Result<Vec<u8>, HistoryError>;
    fn load(&self, bytes: &[u8]) -> Result<Vec<Message>, HistoryError>;
}

/// On-disk layout. Unknown keys (e.g. `model`, `temperature`) are ignored
/// on load.
#[derive(Serialize, Deserialize)]
struct HistoryDocument {
    messages: Vec<Message>,
}

/// Pretty-printed JSON document `{"messages": [...]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHistorySerializer;

impl HistorySerializer for JsonHistorySerializer {
    fn save(&self, messages: &[Message]) -> Result<Vec<u8>, HistoryError> {
        let document = HistoryDocument {
            messages: messages.to_vec(),
        };
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    fn load(&self, bytes: &[u8]) -> Result<Vec<Message>, HistoryError> {
        let document: HistoryDocument = serde_json::from_slice(bytes)?;
        Ok(document.messages)
    }
}
