use stowage_storage::{CompletedPart, ObjectInfo, StorageError};

use crate::Violation;

/// Whether a transfer still expects bytes after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    More,
    Done,
}

/// Counts received bytes against the declared size.
///
/// Finishes exactly when the count reaches the declared size. A chunk that
/// would push past it, or carries no bytes, is refused and leaves the count
/// unchanged.
#[derive(Debug, Clone)]
pub struct ByteCounter {
    expected: u64,
    received: u64,
}

impl ByteCounter {
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            received: 0,
        }
    }

    /// Accounts for one chunk of `len` bytes.
    pub fn accept(&mut self, len: usize) -> Result<ChunkState, Violation> {
        if len == 0 {
            return Err(Violation::EmptyChunk);
        }
        let received = self.received.saturating_add(len as u64);
        if received > self.expected {
            return Err(Violation::Overshoot {
                expected: self.expected,
                received,
            });
        }
        self.received = received;
        if received == self.expected {
            Ok(ChunkState::Done)
        } else {
            Ok(ChunkState::More)
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }
}

/// What a part worker reports back: the token needed to finalize, or the
/// error that exhausted its retries.
#[derive(Debug)]
pub struct PartUploadResult {
    pub part_number: u32,
    pub outcome: Result<CompletedPart, StorageError>,
}

/// A finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub bytes: u64,
    pub object: ObjectInfo,
}
