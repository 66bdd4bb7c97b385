use std::time::Duration;

/// Sent as the status of the greeting that opens every handshake.
pub const STATUS_READY: &str = "READY";

/// Status attached to every progress update.
pub const STATUS_PART_COMPLETED: &str = "part upload completed";

/// Client request to abandon the transfer in progress.
pub const CANCEL: &str = "CANCEL";

/// Server request for the next binary chunk.
///
/// Both transfer strategies use this literal.
pub const NEXT: &str = "NEXT";

/// All declared bytes arrived; the multipart session is being finalized.
pub const UPLOAD_COMPLETED: &str = "UPLOAD_COMPLETED";

/// Transfer fully done, the server is about to greet the next file.
pub const COMPLETED: &str = "COMPLETED";

/// Status codes carried by [`StatusMessage`](crate::StatusMessage).
pub const CODE_OK: u16 = 200;
pub const CODE_BAD_REQUEST: u16 = 400;
pub const CODE_SERVER_ERROR: u16 = 500;

/// Files at or above this size go through a multipart session (5 MiB).
///
/// Remote multipart stores reject non-final parts smaller than this, so
/// smaller files are always sent with a single write.
pub const MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Time allowed for the WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum accepted frame size in bytes (64 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Default route for the upload socket.
pub const UPLOAD_PATH: &str = "/ws/upload";
