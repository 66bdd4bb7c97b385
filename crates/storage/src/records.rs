//! File metadata records: one row per uploaded filename.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordError;

/// A boxed future returned by [`FileRecords`] methods.
pub type RecordFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RecordError>> + Send + 'a>>;

/// Upload state of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadState {
    Uploading,
    Completed,
    Error,
}

/// Metadata row of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: u64,
    pub name: String,
    pub upload_status: UploadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_link: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata store keyed by filename.
pub trait FileRecords: Send + Sync + 'static {
    fn find_by_name<'a>(&'a self, name: &'a str) -> RecordFuture<'a, Option<FileRecord>>;

    /// Inserts a new row in the `UPLOADING` state.
    fn create<'a>(&'a self, name: &'a str, link: &'a str) -> RecordFuture<'a, FileRecord>;

    fn update_status<'a>(&'a self, name: &'a str, status: UploadState) -> RecordFuture<'a, ()>;

    fn update_link_and_status<'a>(
        &'a self,
        name: &'a str,
        status: UploadState,
        link: &'a str,
    ) -> RecordFuture<'a, ()>;
}

/// In-memory [`FileRecords`] implementation.
#[derive(Default)]
pub struct MemoryFileRecords {
    rows: RwLock<HashMap<String, FileRecord>>,
    next_id: AtomicU64,
}

impl MemoryFileRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the row for `name`.
    pub fn get(&self, name: &str) -> Option<FileRecord> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(
        &self,
        name: &str,
        apply: impl FnOnce(&mut FileRecord),
    ) -> Result<(), RecordError> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = rows
            .get_mut(name)
            .ok_or_else(|| RecordError::NotFound(name.to_string()))?;
        apply(row);
        row.updated_at = Utc::now();
        Ok(())
    }
}

impl FileRecords for MemoryFileRecords {
    fn find_by_name<'a>(&'a self, name: &'a str) -> RecordFuture<'a, Option<FileRecord>> {
        Box::pin(async move { Ok(self.get(name)) })
    }

    fn create<'a>(&'a self, name: &'a str, link: &'a str) -> RecordFuture<'a, FileRecord> {
        Box::pin(async move {
            let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
            if rows.contains_key(name) {
                return Err(RecordError::AlreadyExists(name.to_string()));
            }
            let record = FileRecord {
                id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                name: name.to_string(),
                upload_status: UploadState::Uploading,
                storage_link: Some(link.to_string()),
                updated_at: Utc::now(),
            };
            rows.insert(name.to_string(), record.clone());
            Ok(record)
        })
    }

    fn update_status<'a>(&'a self, name: &'a str, status: UploadState) -> RecordFuture<'a, ()> {
        Box::pin(async move { self.update(name, |row| row.upload_status = status) })
    }

    fn update_link_and_status<'a>(
        &'a self,
        name: &'a str,
        status: UploadState,
        link: &'a str,
    ) -> RecordFuture<'a, ()> {
        Box::pin(async move {
            self.update(name, |row| {
                row.upload_status = status;
                row.storage_link = Some(link.to_string());
            })
        })
    }
}
