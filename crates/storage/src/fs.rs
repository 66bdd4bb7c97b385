//! Directory-backed object store.
//!
//! Layout under `root`:
//! - `<bucket>/<key>`: finished objects
//! - `.multipart/<upload_id>/<part>.part`: staged parts of open sessions

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::checksum::checksum_bytes;
use crate::store::{CompletedPart, MultipartSession, ObjectInfo, ObjectStore, StorageFuture, check_part_order};
use crate::{DEFAULT_MIN_PART_SIZE, MAX_PART_NUMBER, StorageError, validate_object_key};

const STAGING_DIR: &str = ".multipart";
const ASSEMBLY_FILE: &str = "assembled.tmp";

/// Stores objects as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
    min_part_size: u64,
}

impl FsObjectStore {
    /// Creates a store rooted at `root` that writes into `bucket`.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            min_part_size: DEFAULT_MIN_PART_SIZE,
        }
    }

    /// Overrides the minimum size of non-final parts.
    pub fn with_min_part_size(mut self, min_part_size: u64) -> Self {
        self.min_part_size = min_part_size;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Path of the finished object stored under `key`.
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(&self.bucket).join(key)
    }

    fn staging_dir(&self, upload_id: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(upload_id)
    }

    fn part_path(&self, upload_id: &str, part_number: u32) -> PathBuf {
        self.staging_dir(upload_id)
            .join(format!("{part_number:05}.part"))
    }

    /// Returns the staging directory of an open session.
    async fn open_session_dir(&self, session: &MultipartSession) -> Result<PathBuf, StorageError> {
        if session.bucket != self.bucket {
            return Err(StorageError::remote(
                404,
                "NoSuchBucket",
                format!("bucket {} does not exist", session.bucket),
            ));
        }
        let dir = self.staging_dir(&session.upload_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(StorageError::no_such_upload(&session.upload_id));
        }
        Ok(dir)
    }

    async fn move_into_place(&self, tmp: &Path, key: &str) -> Result<(), StorageError> {
        let dest = self.object_path(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(tmp, &dest).await?;
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn create_multipart<'a>(&'a self, key: &'a str) -> StorageFuture<'a, MultipartSession> {
        Box::pin(async move {
            validate_object_key(key)?;
            let upload_id = uuid::Uuid::new_v4().simple().to_string();
            tokio::fs::create_dir_all(self.staging_dir(&upload_id)).await?;
            debug!(key, upload_id = %upload_id, "multipart session opened");
            Ok(MultipartSession {
                upload_id,
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
        })
    }

    fn upload_part<'a>(
        &'a self,
        session: &'a MultipartSession,
        part_number: u32,
        data: &'a [u8],
    ) -> StorageFuture<'a, CompletedPart> {
        Box::pin(async move {
            if part_number == 0 || part_number > MAX_PART_NUMBER {
                return Err(StorageError::remote(
                    400,
                    "InvalidArgument",
                    format!("part number must be between 1 and {MAX_PART_NUMBER}"),
                ));
            }
            self.open_session_dir(session).await?;
            tokio::fs::write(self.part_path(&session.upload_id, part_number), data).await?;
            Ok(CompletedPart {
                part_number,
                etag: checksum_bytes(data),
            })
        })
    }

    fn complete_multipart<'a>(
        &'a self,
        session: &'a MultipartSession,
        parts: Vec<CompletedPart>,
    ) -> StorageFuture<'a, ObjectInfo> {
        Box::pin(async move {
            check_part_order(&parts)?;
            let dir = self.open_session_dir(session).await?;

            let tmp = dir.join(ASSEMBLY_FILE);
            let mut out = tokio::fs::File::create(&tmp).await?;
            let mut size = 0u64;
            let mut etags = String::new();
            let last = parts.len() - 1;

            for (i, part) in parts.iter().enumerate() {
                let path = self.part_path(&session.upload_id, part.part_number);
                let data = match tokio::fs::read(&path).await {
                    Ok(data) => data,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return Err(StorageError::remote(
                            400,
                            "InvalidPart",
                            format!("part {} was never uploaded", part.part_number),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                };
                if checksum_bytes(&data) != part.etag {
                    return Err(StorageError::remote(
                        400,
                        "InvalidPart",
                        format!("etag mismatch for part {}", part.part_number),
                    ));
                }
                if i < last && (data.len() as u64) < self.min_part_size {
                    return Err(StorageError::remote(
                        400,
                        "EntityTooSmall",
                        format!(
                            "part {} is {} bytes, minimum is {}",
                            part.part_number,
                            data.len(),
                            self.min_part_size
                        ),
                    ));
                }
                out.write_all(&data).await?;
                size += data.len() as u64;
                etags.push_str(&part.etag);
            }
            out.flush().await?;
            drop(out);

            self.move_into_place(&tmp, &session.key).await?;
            tokio::fs::remove_dir_all(&dir).await?;

            debug!(key = %session.key, size, parts = parts.len(), "multipart session completed");
            Ok(ObjectInfo {
                bucket: self.bucket.clone(),
                key: session.key.clone(),
                size,
                etag: format!("{}-{}", checksum_bytes(etags.as_bytes()), parts.len()),
            })
        })
    }

    fn abort_multipart<'a>(&'a self, session: &'a MultipartSession) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let dir = self.open_session_dir(session).await?;
            tokio::fs::remove_dir_all(&dir).await?;
            debug!(key = %session.key, upload_id = %session.upload_id, "multipart session aborted");
            Ok(())
        })
    }

    fn put_object<'a>(&'a self, key: &'a str, data: Vec<u8>) -> StorageFuture<'a, ObjectInfo> {
        Box::pin(async move {
            validate_object_key(key)?;
            let staging = self.root.join(STAGING_DIR);
            tokio::fs::create_dir_all(&staging).await?;

            let tmp = staging.join(format!("put-{}.tmp", uuid::Uuid::new_v4().simple()));
            tokio::fs::write(&tmp, &data).await?;
            self.move_into_place(&tmp, key).await?;

            Ok(ObjectInfo {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                size: data.len() as u64,
                etag: checksum_bytes(&data),
            })
        })
    }
}
