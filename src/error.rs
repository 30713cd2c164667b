//! Crate-level error type.

use thiserror::Error;

use crate::hooks::HookFailure;
use crate::session::HistoryError;
use crate::transport::TransportError;

/// Result alias used across the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by processing and sessions.
///
/// Malformed tags and unmatched source identifiers are not errors: the
/// former stay inline in the residual text, the latter classify as
/// `Standard`.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend failed; passed through unmodified
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A hook callback failed and no error hook cleared it
    #[error(transparent)]
    Hook(#[from] HookFailure),

    /// History could not be serialized or restored
    #[error(transparent)]
    History(#[from] HistoryError),

    /// A configuration value was rejected by [`crate::Config::validate`]
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_hook(&self) -> bool {
        matches!(self, Error::Hook(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
