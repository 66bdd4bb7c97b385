//! Upload sessions over the stowage WebSocket protocol.
//!
//! A connection carries one session after another. Each session greets the
//! client, reads an [`UploadHeader`](stowage_protocol::UploadHeader), picks a
//! [`Strategy`] from the declared size and streams the file into an
//! [`ObjectStore`](stowage_storage::ObjectStore), either with one write or
//! through a multipart session whose parts upload concurrently.

mod connection;
mod error;
mod handshake;
mod multipart;
mod progress;
mod recorder;
mod session;
mod single;
mod strategy;
mod types;
mod worker;

#[cfg(test)]
mod testing;

use std::time::Duration;

pub use connection::{Frame, FrameReader, FrameWriter, split_socket};
pub use error::{TransportError, UploadError, Violation};
pub use handshake::handshake;
pub use multipart::{MultipartOptions, multipart_upload};
pub use progress::ProgressReporter;
pub use recorder::MetadataRecorder;
pub use session::{SessionState, UploadConfig, UploadService};
pub use single::single_part_upload;
pub use strategy::Strategy;
pub use types::{ByteCounter, ChunkState, PartUploadResult, TransferReceipt};
pub use worker::{RetryPolicy, upload_part_with_retry};

/// Extra attempts after a failed part upload.
pub const DEFAULT_RETRIES: u32 = 3;

/// Pause between part upload attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(15);

/// Part uploads allowed in flight per multipart session.
pub const DEFAULT_MAX_INFLIGHT_PARTS: usize = 4;

/// Longest wait for the next client frame.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
