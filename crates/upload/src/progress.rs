use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use stowage_protocol::StatusMessage;
use tracing::warn;

use crate::FrameWriter;

/// Writes progress updates to the client.
///
/// Shared by every part worker of a session; the completed-part count is
/// a single atomic. Updates are best-effort: a failed write is logged and
/// the transfer carries on.
pub struct ProgressReporter {
    writer: FrameWriter,
    completed_parts: AtomicU64,
}

impl ProgressReporter {
    pub fn new(writer: FrameWriter) -> Self {
        Self {
            writer,
            completed_parts: AtomicU64::new(0),
        }
    }

    /// Sends `{status:"part upload completed", part}`.
    pub async fn report(&self, part: u64) {
        if let Err(e) = self.writer.send(&StatusMessage::progress(part).into()).await {
            warn!(part, "progress update not delivered: {e}");
        }
    }

    /// Counts one more finished part and reports the running total.
    pub async fn part_completed(&self) -> u64 {
        let done = self.completed_parts.fetch_add(1, Ordering::AcqRel) + 1;
        self.report(done).await;
        done
    }

    pub fn completed_parts(&self) -> u64 {
        self.completed_parts.load(Ordering::Acquire)
    }
}

/// Average throughput of `bytes` over `elapsed`, in bytes per second.
///
/// Returns 0.0 when no time has passed.
pub(crate) fn bytes_per_second(bytes: u64, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return 0.0;
    }
    bytes as f64 / elapsed.as_secs_f64()
}
