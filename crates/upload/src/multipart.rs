//! Multipart orchestration: one part per chunk, uploaded concurrently,
//! finalized in part-number order.

use std::sync::Arc;

use stowage_protocol::{ClientText, ServerFrame, UploadHeader};
use stowage_storage::{MAX_PART_NUMBER, MultipartSession, ObjectStore, StorageError};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    ByteCounter, ChunkState, DEFAULT_MAX_INFLIGHT_PARTS, Frame, FrameReader, FrameWriter,
    PartUploadResult, ProgressReporter, RetryPolicy, TransferReceipt, UploadError, Violation,
    upload_part_with_retry,
};

/// Tuning of a multipart transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartOptions {
    pub retry: RetryPolicy,
    /// Part uploads allowed to run at once. Zero is treated as one.
    pub max_inflight_parts: usize,
}

impl Default for MultipartOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_inflight_parts: DEFAULT_MAX_INFLIGHT_PARTS,
        }
    }
}

/// Streams a file into a multipart session.
///
/// Every binary chunk becomes the next part and is handed to a worker
/// task; the next chunk is requested without waiting for that upload.
/// Once all declared bytes arrived the client gets `UPLOAD_COMPLETED`,
/// every worker is awaited and the session is finalized with the parts
/// sorted by number. A single failed part aborts the whole session, as
/// does cancellation, a protocol violation or a lost connection.
pub async fn multipart_upload(
    reader: &mut FrameReader,
    writer: &FrameWriter,
    store: Arc<dyn ObjectStore>,
    header: &UploadHeader,
    options: MultipartOptions,
) -> Result<TransferReceipt, UploadError> {
    let session = store
        .create_multipart(&header.filename)
        .await
        .map_err(UploadError::SessionOpen)?;
    info!(
        filename = %header.filename,
        upload_id = %session.upload_id,
        "multipart session opened"
    );

    let mut parts = PartDispatcher::new(store, session, writer.clone(), options);
    match receive_parts(reader, writer, header, &mut parts).await {
        Ok(bytes) => parts.finish(bytes).await,
        Err(e) => {
            parts.abandon().await;
            Err(e)
        }
    }
}

/// Reads chunks until the declared size is reached. Returns the byte count.
async fn receive_parts(
    reader: &mut FrameReader,
    writer: &FrameWriter,
    header: &UploadHeader,
    parts: &mut PartDispatcher,
) -> Result<u64, UploadError> {
    let mut counter = ByteCounter::new(header.size);

    loop {
        let chunk = match reader.recv().await? {
            Frame::Binary(chunk) => chunk,
            Frame::Text(text) => {
                return match ClientText::classify(&text) {
                    ClientText::Cancel => {
                        info!(
                            filename = %header.filename,
                            bytes = counter.received(),
                            parts = parts.dispatched(),
                            "upload canceled by client"
                        );
                        Err(UploadError::Cancelled {
                            bytes: counter.received(),
                        })
                    }
                    ClientText::Other(_) => Err(Violation::ExpectedBinary.into()),
                };
            }
        };

        let state = counter.accept(chunk.len())?;
        let part_number = parts.dispatch(chunk).await?;
        debug!(
            filename = %header.filename,
            part = part_number,
            bytes = counter.received(),
            total = header.size,
            "part dispatched"
        );

        if state == ChunkState::Done {
            break;
        }
        writer.send(&ServerFrame::Next).await?;
    }

    writer.send(&ServerFrame::UploadCompleted).await?;
    Ok(counter.received())
}

/// Spawns part workers and collects their results.
///
/// Workers hold a semaphore permit while they run and report through an
/// unbounded channel; the channel closes once the dispatcher's sender and
/// every worker's clone are gone.
struct PartDispatcher {
    store: Arc<dyn ObjectStore>,
    session: Arc<MultipartSession>,
    progress: Arc<ProgressReporter>,
    permits: Arc<Semaphore>,
    results_tx: mpsc::UnboundedSender<PartUploadResult>,
    results_rx: mpsc::UnboundedReceiver<PartUploadResult>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    next_part: u32,
}

impl PartDispatcher {
    fn new(
        store: Arc<dyn ObjectStore>,
        session: MultipartSession,
        writer: FrameWriter,
        options: MultipartOptions,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            store,
            session: Arc::new(session),
            progress: Arc::new(ProgressReporter::new(writer)),
            permits: Arc::new(Semaphore::new(options.max_inflight_parts.max(1))),
            results_tx,
            results_rx,
            cancel: CancellationToken::new(),
            retry: options.retry,
            next_part: 1,
        }
    }

    fn dispatched(&self) -> u32 {
        self.next_part - 1
    }

    /// Starts the upload of the next part once a slot is free.
    async fn dispatch(&mut self, data: Vec<u8>) -> Result<u32, UploadError> {
        let part_number = self.next_part;
        if part_number > MAX_PART_NUMBER {
            return Err(Violation::TooManyParts {
                max: MAX_PART_NUMBER,
            }
            .into());
        }

        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        self.next_part += 1;

        let store = Arc::clone(&self.store);
        let session = Arc::clone(&self.session);
        let progress = Arc::clone(&self.progress);
        let results = self.results_tx.clone();
        let cancel = self.cancel.clone();
        let retry = self.retry;
        tokio::spawn(async move {
            let result = upload_part_with_retry(
                store.as_ref(),
                &session,
                part_number,
                &data,
                retry,
                &cancel,
            )
            .await;
            drop(permit);
            if result.outcome.is_ok() && !cancel.is_cancelled() {
                progress.part_completed().await;
            }
            let _ = results.send(result);
        });

        Ok(part_number)
    }

    /// Waits for every worker, then finalizes or aborts the session.
    async fn finish(self, bytes: u64) -> Result<TransferReceipt, UploadError> {
        let dispatched = self.dispatched();
        let PartDispatcher {
            store,
            session,
            results_tx,
            mut results_rx,
            ..
        } = self;
        drop(results_tx);

        let mut results = Vec::with_capacity(dispatched as usize);
        while let Some(result) = results_rx.recv().await {
            results.push(result);
        }
        results.sort_by_key(|r| r.part_number);

        let mut completed = Vec::with_capacity(results.len());
        let mut expected_part = 1;
        for result in results {
            if result.part_number != expected_part {
                break;
            }
            match result.outcome {
                Ok(part) => completed.push(part),
                Err(source) => {
                    abort_session(store.as_ref(), &session).await;
                    return Err(UploadError::PartFailed {
                        part_number: result.part_number,
                        source,
                    });
                }
            }
            expected_part += 1;
        }

        if completed.len() != dispatched as usize {
            abort_session(store.as_ref(), &session).await;
            return Err(UploadError::PartFailed {
                part_number: expected_part,
                source: StorageError::remote(500, "InternalError", "part worker exited without a result"),
            });
        }

        let object = match store.complete_multipart(&session, completed).await {
            Ok(object) => object,
            Err(e) => {
                abort_session(store.as_ref(), &session).await;
                return Err(UploadError::Storage(e));
            }
        };
        info!(
            key = %object.key,
            upload_id = %session.upload_id,
            parts = dispatched,
            "multipart session completed"
        );

        Ok(TransferReceipt { bytes, object })
    }

    /// Gives up on the session.
    ///
    /// Running workers stop retrying and report nothing to the client. They
    /// are waited for before the abort, so none outlives the transfer.
    async fn abandon(self) {
        let PartDispatcher {
            store,
            session,
            results_tx,
            mut results_rx,
            cancel,
            ..
        } = self;
        cancel.cancel();
        drop(results_tx);
        while results_rx.recv().await.is_some() {}
        abort_session(store.as_ref(), &session).await;
    }
}

/// Best-effort abort of a multipart session.
async fn abort_session(store: &dyn ObjectStore, session: &MultipartSession) {
    match store.abort_multipart(session).await {
        Ok(()) => info!(upload_id = %session.upload_id, key = %session.key, "multipart session aborted"),
        Err(e) => warn!(upload_id = %session.upload_id, key = %session.key, "abort failed: {e}"),
    }
}
