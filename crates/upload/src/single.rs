use stowage_protocol::{ClientText, ServerFrame, UploadHeader};
use stowage_storage::ObjectStore;
use tracing::{debug, info};

use crate::{
    ByteCounter, ChunkState, Frame, FrameReader, FrameWriter, ProgressReporter, TransferReceipt,
    UploadError, Violation,
};

/// Largest buffer reserved up front from the declared size.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Collects every chunk in memory, then stores the file with one write.
///
/// Nothing reaches the store unless all declared bytes arrived.
pub async fn single_part_upload(
    reader: &mut FrameReader,
    writer: &FrameWriter,
    store: &dyn ObjectStore,
    header: &UploadHeader,
) -> Result<TransferReceipt, UploadError> {
    let capacity = usize::try_from(header.size).map_or(MAX_PREALLOC, |n| n.min(MAX_PREALLOC));
    let mut buffer = Vec::with_capacity(capacity);
    let mut counter = ByteCounter::new(header.size);

    loop {
        let chunk = match reader.recv().await? {
            Frame::Binary(chunk) => chunk,
            Frame::Text(text) => {
                return match ClientText::classify(&text) {
                    ClientText::Cancel => {
                        info!(filename = %header.filename, bytes = counter.received(), "upload canceled by client");
                        Err(UploadError::Cancelled {
                            bytes: counter.received(),
                        })
                    }
                    ClientText::Other(_) => Err(Violation::ExpectedBinary.into()),
                };
            }
        };

        let state = counter.accept(chunk.len())?;
        buffer.extend_from_slice(&chunk);
        debug!(
            filename = %header.filename,
            bytes = counter.received(),
            total = header.size,
            "chunk received"
        );

        if state == ChunkState::Done {
            break;
        }
        writer.send(&ServerFrame::Next).await?;
    }

    let object = store.put_object(&header.filename, buffer).await?;
    ProgressReporter::new(writer.clone()).report(100).await;

    Ok(TransferReceipt {
        bytes: counter.received(),
        object,
    })
}
