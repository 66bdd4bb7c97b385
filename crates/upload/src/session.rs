//! The per-connection session loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Sink, Stream};
use stowage_protocol::constants::{CODE_OK, CODE_SERVER_ERROR, MULTIPART_THRESHOLD};
use stowage_protocol::{ServerFrame, UploadHeader};
use stowage_storage::{FileRecords, ObjectStore};
use tokio_tungstenite::tungstenite::{self, protocol::Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::bytes_per_second;
use crate::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_INFLIGHT_PARTS, FrameReader, FrameWriter, MetadataRecorder,
    MultipartOptions, RetryPolicy, Strategy, TransferReceipt, TransportError, UploadError,
    handshake, multipart_upload, single_part_upload, split_socket,
};

/// Settings shared by every session of an [`UploadService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Declared sizes at or above this go through a multipart session.
    pub multipart_threshold: u64,
    pub retry: RetryPolicy,
    pub max_inflight_parts: usize,
    /// Longest wait for a client frame. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Base URL of the download links stored in file records.
    pub public_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: MULTIPART_THRESHOLD,
            retry: RetryPolicy::default(),
            max_inflight_parts: DEFAULT_MAX_INFLIGHT_PARTS,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            public_url: "http://localhost:8080".into(),
        }
    }
}

/// Where a session stands.
///
/// Every session starts at [`AwaitHeader`](SessionState::AwaitHeader) and
/// returns there once its outcome was reported, so nothing carries over
/// from one file to the next.
#[derive(Debug)]
pub enum SessionState {
    /// Greet the client and wait for a header.
    AwaitHeader,
    /// Header accepted; the transfer runs next.
    HeaderOk(UploadHeader),
    /// The file is stored; the client has not been told yet.
    Stored {
        filename: String,
        receipt: TransferReceipt,
    },
    /// The session failed or was canceled; the reason goes to the client.
    Rejected(UploadError),
}

/// Serves upload connections against one object store and one metadata
/// store.
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    recorder: MetadataRecorder,
    config: UploadConfig,
}

impl UploadService {
    pub fn new(
        config: UploadConfig,
        store: Arc<dyn ObjectStore>,
        records: Arc<dyn FileRecords>,
    ) -> Self {
        Self {
            store,
            recorder: MetadataRecorder::new(records, config.public_url.clone()),
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Runs sessions on an upgraded WebSocket until the client goes away.
    ///
    /// Returns the number of files stored. A clean disconnect is not an
    /// error; idle timeouts and socket failures are.
    pub async fn serve<S>(&self, ws: S) -> Result<usize, TransportError>
    where
        S: Stream<Item = Result<WsMessage, tungstenite::Error>>
            + Sink<WsMessage, Error = tungstenite::Error>
            + Send
            + 'static,
    {
        self.serve_until(ws, CancellationToken::new()).await
    }

    /// Like [`serve`](Self::serve), but ends once `shutdown` is cancelled.
    ///
    /// A transfer in progress is abandoned the same way as on a lost
    /// connection, so open multipart sessions are aborted.
    pub async fn serve_until<S>(
        &self,
        ws: S,
        shutdown: CancellationToken,
    ) -> Result<usize, TransportError>
    where
        S: Stream<Item = Result<WsMessage, tungstenite::Error>>
            + Sink<WsMessage, Error = tungstenite::Error>
            + Send
            + 'static,
    {
        let (reader, writer) = split_socket(ws, self.config.idle_timeout);
        let mut reader = reader.with_shutdown(shutdown);
        let mut stored = 0;
        let mut state = SessionState::AwaitHeader;

        let err = loop {
            state = match self.step(state, &mut reader, &writer).await {
                Ok(next) => next,
                Err(e) => break e,
            };
            if matches!(state, SessionState::Stored { .. }) {
                stored += 1;
            }
        };
        writer.close().await;

        match err {
            TransportError::Shutdown => {
                info!(stored, "session ended by shutdown");
                Ok(stored)
            }
            err if err.is_disconnect() => {
                debug!(stored, "client disconnected");
                Ok(stored)
            }
            err => Err(err),
        }
    }

    /// Advances a session by one state.
    ///
    /// Only transport failures escape; everything else becomes
    /// [`SessionState::Rejected`] and is reported to the client.
    pub async fn step(
        &self,
        state: SessionState,
        reader: &mut FrameReader,
        writer: &FrameWriter,
    ) -> Result<SessionState, TransportError> {
        let next = match state {
            SessionState::AwaitHeader => match handshake(reader, writer).await {
                Ok(header) => SessionState::HeaderOk(header),
                Err(e) => SessionState::Rejected(e),
            },
            SessionState::HeaderOk(header) => self.transfer(reader, writer, header).await,
            SessionState::Stored { filename, receipt } => {
                writer
                    .send_status(
                        CODE_OK,
                        format!("File upload successful: {filename} ({} bytes)", receipt.bytes),
                    )
                    .await?;
                writer.send(&ServerFrame::Completed).await?;
                SessionState::AwaitHeader
            }
            SessionState::Rejected(UploadError::Transport(e)) => return Err(e),
            SessionState::Rejected(err) => {
                let code = err.status_code().unwrap_or(CODE_SERVER_ERROR);
                warn!(code, "session rejected: {err}");
                writer.send_status(code, err.to_string()).await?;
                SessionState::AwaitHeader
            }
        };
        Ok(next)
    }

    async fn transfer(
        &self,
        reader: &mut FrameReader,
        writer: &FrameWriter,
        header: UploadHeader,
    ) -> SessionState {
        let strategy = Strategy::select(header.size, self.config.multipart_threshold);
        info!(
            filename = %header.filename,
            size = header.size,
            %strategy,
            "upload started"
        );
        self.recorder.begin(&header.filename).await;

        let started = Instant::now();
        let result = match strategy {
            Strategy::SinglePart => {
                single_part_upload(reader, writer, self.store.as_ref(), &header).await
            }
            Strategy::MultiPart => {
                multipart_upload(
                    reader,
                    writer,
                    Arc::clone(&self.store),
                    &header,
                    self.multipart_options(),
                )
                .await
            }
        };

        match result {
            Ok(receipt) => {
                self.recorder.completed(&header.filename).await;
                info!(
                    filename = %header.filename,
                    bytes = receipt.bytes,
                    etag = %receipt.object.etag,
                    bytes_per_sec = bytes_per_second(receipt.bytes, started.elapsed()) as u64,
                    "upload stored"
                );
                SessionState::Stored {
                    filename: header.filename,
                    receipt,
                }
            }
            Err(e) => {
                self.recorder.failed(&header.filename).await;
                SessionState::Rejected(e)
            }
        }
    }

    fn multipart_options(&self) -> MultipartOptions {
        MultipartOptions {
            retry: self.config.retry,
            max_inflight_parts: self.config.max_inflight_parts,
        }
    }
}
