use std::time::Duration;

use stowage_storage::{MultipartSession, ObjectStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::PartUploadResult;
use crate::{DEFAULT_RETRIES, DEFAULT_RETRY_BACKOFF};

/// How often and how patiently a failed part upload is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first failure.
    pub retries: u32,
    /// Fixed pause before each retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Uploads one part, retrying with a fixed backoff.
///
/// Never fails: the last error is carried in the returned result. Once
/// `cancel` fires no further attempt is started.
pub async fn upload_part_with_retry(
    store: &dyn ObjectStore,
    session: &MultipartSession,
    part_number: u32,
    data: &[u8],
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> PartUploadResult {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match store.upload_part(session, part_number, data).await {
            Ok(part) => {
                debug!(part = part_number, attempt, bytes = data.len(), "part uploaded");
                return PartUploadResult {
                    part_number,
                    outcome: Ok(part),
                };
            }
            Err(e) => e,
        };

        if attempt > policy.retries || cancel.is_cancelled() {
            error!(part = part_number, attempt, "part upload failed: {err}");
            return PartUploadResult {
                part_number,
                outcome: Err(err),
            };
        }

        warn!(
            part = part_number,
            attempt,
            "part upload failed, retrying in {:?}: {err}",
            policy.backoff
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                return PartUploadResult {
                    part_number,
                    outcome: Err(err),
                };
            }
            _ = tokio::time::sleep(policy.backoff) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_storage::MemoryObjectStore;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::from_secs(15),
        }
    }

    #[tokio::test]
    async fn first_attempt_succeeds() {
        let store = MemoryObjectStore::new();
        let session = store.create_multipart("a.bin").await.unwrap();

        let result =
            upload_part_with_retry(&store, &session, 1, b"abc", policy(3), &CancellationToken::new())
                .await;
        assert_eq!(result.part_number, 1);
        assert!(result.outcome.is_ok());
        assert_eq!(store.calls().part_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_after_backoff() {
        let store = MemoryObjectStore::new();
        store.fail_part(1, 2);
        let session = store.create_multipart("a.bin").await.unwrap();

        let start = tokio::time::Instant::now();
        let result =
            upload_part_with_retry(&store, &session, 1, b"abc", policy(3), &CancellationToken::new())
                .await;
        assert!(result.outcome.is_ok());
        assert_eq!(store.calls().part_attempts, 3);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retries() {
        let store = MemoryObjectStore::new();
        store.fail_part_always(2);
        let session = store.create_multipart("a.bin").await.unwrap();

        let result =
            upload_part_with_retry(&store, &session, 2, b"abc", policy(3), &CancellationToken::new())
                .await;
        assert_eq!(result.part_number, 2);
        assert_eq!(result.outcome.unwrap_err().status(), 500);
        assert_eq!(store.calls().part_attempts, 4);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let store = MemoryObjectStore::new();
        store.fail_part_always(1);
        let session = store.create_multipart("a.bin").await.unwrap();

        let result =
            upload_part_with_retry(&store, &session, 1, b"abc", policy(0), &CancellationToken::new())
                .await;
        assert!(result.outcome.is_err());
        assert_eq!(store.calls().part_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_retrying() {
        let store = MemoryObjectStore::new();
        store.fail_part_always(1);
        let session = store.create_multipart("a.bin").await.unwrap();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result = upload_part_with_retry(&store, &session, 1, b"abc", policy(3), &cancel).await;
        assert!(result.outcome.is_err());
        assert_eq!(store.calls().part_attempts, 1);
    }
}
