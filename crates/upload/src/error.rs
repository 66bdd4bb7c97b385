use std::time::Duration;

use stowage_protocol::ProtocolError;
use stowage_protocol::constants::{CODE_BAD_REQUEST, CODE_SERVER_ERROR};
use stowage_storage::StorageError;
use tokio_tungstenite::tungstenite;

/// Read or write failure on the connection. Always ends the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("no frame received within {0:?}")]
    IdleTimeout(Duration),

    #[error("server shutting down")]
    Shutdown,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TransportError {
    /// `true` when the peer simply went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Closed => true,
            TransportError::WebSocket(e) => matches!(
                e,
                tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed
                    | tungstenite::Error::Protocol(
                        tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
                    )
            ),
            _ => false,
        }
    }
}

/// A client message of the wrong kind or shape.
///
/// The display text is the reason sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error(transparent)]
    Header(#[from] ProtocolError),

    #[error("Invalid message received, expecting file name and length")]
    HeaderNotText,

    #[error("Invalid file block received, expecting binary chunk, closing")]
    ExpectedBinary,

    #[error("Empty file block received")]
    EmptyChunk,

    #[error("Chunk exceeds declared size: {received} of {expected} bytes")]
    Overshoot { expected: u64, received: u64 },

    #[error("Too many file blocks: at most {max} parts per upload")]
    TooManyParts { max: u32 },
}

/// Terminal outcome of a session other than success.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    Protocol(#[from] Violation),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("Error initiating multipart upload: {0}")]
    SessionOpen(#[source] StorageError),

    #[error("Part {part_number} upload failed: {source}")]
    PartFailed {
        part_number: u32,
        #[source]
        source: StorageError,
    },

    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Upload failed: part dispatch stopped")]
    Dispatch(#[from] tokio::sync::AcquireError),

    #[error("Upload canceled")]
    Cancelled { bytes: u64 },
}

impl UploadError {
    /// Status code reported to the client, or `None` when the client is
    /// unreachable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::Protocol(_) | UploadError::Cancelled { .. } => Some(CODE_BAD_REQUEST),
            UploadError::SessionOpen(_)
            | UploadError::PartFailed { .. }
            | UploadError::Storage(_)
            | UploadError::Dispatch(_) => Some(CODE_SERVER_ERROR),
            UploadError::Transport(_) => None,
        }
    }
}
