// error.rs — Error types for the proposal review subsystem.

use thiserror::Error;

/// Errors that can occur while loading or reviewing a proposal.
///
/// Note what is *not* here: selecting a blocked change is a silent no-op,
/// not an error.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// Accept was requested with nothing selectable.
    #[error("nothing selected: accept needs at least one operation or change")]
    EmptySelection,

    /// The review was already accepted or rejected.
    #[error("review {review_id} already {state}")]
    AlreadyDecided { review_id: String, state: String },

    /// An index outside the proposal's operation or change list.
    #[error("{kind} index {index} out of range (proposal has {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// No schema is registered for the requested proposal kind.
    #[error("unknown proposal kind: {0}")]
    UnknownKind(String),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failure.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Malformed review configuration.
    #[error("config error: {0}")]
    ConfigError(#[from] toml::de::Error),
}
