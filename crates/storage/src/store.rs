//! The object store capability.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// A boxed future returned by [`ObjectStore`] methods.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Handle to an open multipart session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartSession {
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
}

/// Token returned by a successful part upload; needed to finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Result of a finished write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: String,
}

/// S3-style object storage.
///
/// Multipart writes go through a session: open it, upload numbered parts
/// (possibly concurrently and out of order), then either finalize with the
/// part list in ascending order or abort it.
pub trait ObjectStore: Send + Sync + 'static {
    /// Opens a multipart session for `key`.
    fn create_multipart<'a>(&'a self, key: &'a str) -> StorageFuture<'a, MultipartSession>;

    /// Uploads one part. Part numbers start at 1.
    fn upload_part<'a>(
        &'a self,
        session: &'a MultipartSession,
        part_number: u32,
        data: &'a [u8],
    ) -> StorageFuture<'a, CompletedPart>;

    /// Assembles the uploaded parts into one object.
    ///
    /// `parts` must be strictly ascending by part number.
    fn complete_multipart<'a>(
        &'a self,
        session: &'a MultipartSession,
        parts: Vec<CompletedPart>,
    ) -> StorageFuture<'a, ObjectInfo>;

    /// Discards the session and every part uploaded to it.
    fn abort_multipart<'a>(&'a self, session: &'a MultipartSession) -> StorageFuture<'a, ()>;

    /// Stores `data` under `key` in a single write.
    fn put_object<'a>(&'a self, key: &'a str, data: Vec<u8>) -> StorageFuture<'a, ObjectInfo>;
}

/// Checks that a completion list is non-empty and strictly ascending.
pub(crate) fn check_part_order(parts: &[CompletedPart]) -> Result<(), StorageError> {
    if parts.is_empty() {
        return Err(StorageError::remote(
            400,
            "MalformedXML",
            "completion requires at least one part",
        ));
    }
    for pair in parts.windows(2) {
        if pair[0].part_number >= pair[1].part_number {
            return Err(StorageError::remote(
                400,
                "InvalidPartOrder",
                format!(
                    "part {} listed after part {}",
                    pair[1].part_number, pair[0].part_number
                ),
            ));
        }
    }
    Ok(())
}
