use std::sync::Arc;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use stowage_storage::{FileRecords, UploadState};
use tracing::{debug, warn};

/// Keeps the metadata row of each uploaded file in step with its transfer.
///
/// Every method is best-effort: failures are logged and never affect the
/// transfer itself.
pub struct MetadataRecorder {
    records: Arc<dyn FileRecords>,
    public_url: String,
}

impl MetadataRecorder {
    pub fn new(records: Arc<dyn FileRecords>, public_url: impl Into<String>) -> Self {
        Self {
            records,
            public_url: public_url.into(),
        }
    }

    /// Download link of a stored file.
    pub fn storage_link(&self, filename: &str) -> String {
        format!(
            "{}/download?file={}",
            self.public_url.trim_end_matches('/'),
            utf8_percent_encode(filename, NON_ALPHANUMERIC)
        )
    }

    /// Creates the row, or moves an existing one back to `UPLOADING`.
    pub async fn begin(&self, filename: &str) {
        match self.records.find_by_name(filename).await {
            Ok(Some(_)) => self.set_status(filename, UploadState::Uploading).await,
            Ok(None) => {
                let link = self.storage_link(filename);
                match self.records.create(filename, &link).await {
                    Ok(record) => debug!(filename, id = record.id, "file record created"),
                    Err(e) => warn!(filename, "failed to create file record: {e}"),
                }
            }
            Err(e) => warn!(filename, "failed to look up file record: {e}"),
        }
    }

    /// Marks the file stored and refreshes its link.
    pub async fn completed(&self, filename: &str) {
        let link = self.storage_link(filename);
        if let Err(e) = self
            .records
            .update_link_and_status(filename, UploadState::Completed, &link)
            .await
        {
            warn!(filename, "failed to mark file record completed: {e}");
        }
    }

    /// Marks the transfer failed. Used for cancellation too.
    pub async fn failed(&self, filename: &str) {
        self.set_status(filename, UploadState::Error).await;
    }

    async fn set_status(&self, filename: &str, status: UploadState) {
        if let Err(e) = self.records.update_status(filename, status).await {
            warn!(filename, ?status, "failed to update file record: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_storage::MemoryFileRecords;

    fn recorder() -> (Arc<MemoryFileRecords>, MetadataRecorder) {
        let records = Arc::new(MemoryFileRecords::new());
        let recorder = MetadataRecorder::new(records.clone(), "http://files.local:8080/");
        (records, recorder)
    }

    #[test]
    fn link_is_percent_encoded() {
        let (_, recorder) = recorder();
        assert_eq!(
            recorder.storage_link("my report.pdf"),
            "http://files.local:8080/download?file=my%20report%2Epdf"
        );
    }

    #[tokio::test]
    async fn lifecycle() {
        let (records, recorder) = recorder();

        recorder.begin("a.bin").await;
        let row = records.get("a.bin").unwrap();
        assert_eq!(row.upload_status, UploadState::Uploading);
        assert_eq!(
            row.storage_link.as_deref(),
            Some("http://files.local:8080/download?file=a%2Ebin")
        );

        recorder.completed("a.bin").await;
        assert_eq!(records.get("a.bin").unwrap().upload_status, UploadState::Completed);
    }

    #[tokio::test]
    async fn reupload_reuses_row() {
        let (records, recorder) = recorder();

        recorder.begin("a.bin").await;
        recorder.failed("a.bin").await;
        assert_eq!(records.get("a.bin").unwrap().upload_status, UploadState::Error);

        recorder.begin("a.bin").await;
        let row = records.get("a.bin").unwrap();
        assert_eq!(row.upload_status, UploadState::Uploading);
        assert_eq!(row.id, 1);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn missing_row_is_only_logged() {
        let (records, recorder) = recorder();
        recorder.completed("ghost.bin").await;
        recorder.failed("ghost.bin").await;
        assert!(records.is_empty());
    }
}
