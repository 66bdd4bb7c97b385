//! Wire protocol for the stowage upload socket.
//!
//! One WebSocket connection carries a sequence of file transfers. Each
//! transfer starts with a JSON header, continues with raw binary chunks and
//! ends with a handful of literal text frames. Everything the server writes
//! back is either a [`StatusMessage`] or one of the literals in
//! [`constants`].

pub mod constants;
pub mod frames;
pub mod types;

// Re-export primary types for convenience.
pub use frames::{ClientText, ServerFrame};
pub use types::{StatusMessage, UploadHeader};

/// Errors produced while decoding client messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Error receiving file name and length: {0}")]
    InvalidHeader(String),

    #[error("Filename cannot be empty")]
    EmptyFilename,

    #[error("Upload file is empty")]
    EmptyFile,
}
