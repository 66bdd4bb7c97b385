//! Storage capabilities consumed by the upload core.
//!
//! [`ObjectStore`] is the S3-style object store: session-based multipart
//! writes plus single-shot puts, with HTTP-style error statuses.
//! [`FileRecords`] is the metadata store that tracks one row per uploaded
//! filename.

mod checksum;
mod fs;
mod memory;
mod records;
mod store;
mod validation;

pub use checksum::checksum_bytes;
pub use fs::FsObjectStore;
pub use memory::{CallLog, MemoryObjectStore};
pub use records::{FileRecord, FileRecords, MemoryFileRecords, RecordFuture, UploadState};
pub use store::{CompletedPart, MultipartSession, ObjectInfo, ObjectStore, StorageFuture};
pub use validation::validate_object_key;

/// Largest part number a multipart session accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Minimum size of every non-final multipart part (5 MiB).
pub const DEFAULT_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Errors produced by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("{code} ({status}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },
}

impl StorageError {
    /// Builds a remote error with an HTTP-style status.
    pub fn remote(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Remote {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn no_such_upload(upload_id: &str) -> Self {
        Self::remote(404, "NoSuchUpload", format!("upload {upload_id} does not exist"))
    }

    /// HTTP-style status of the failure.
    pub fn status(&self) -> u16 {
        match self {
            StorageError::Io(_) => 500,
            StorageError::InvalidKey(_) => 400,
            StorageError::Remote { status, .. } => *status,
        }
    }
}

/// Errors produced by a [`FileRecords`] store.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("metadata backend error: {0}")]
    Backend(String),
}
