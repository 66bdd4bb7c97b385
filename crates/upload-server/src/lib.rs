//! WebSocket server for stowage uploads.
//!
//! Accepts TCP connections, upgrades requests for the upload route to
//! WebSocket and hands each socket to an
//! [`UploadService`](stowage_upload::UploadService). Connections are
//! independent tasks and all stop on [`UploadServer::shutdown`].

mod server;

use std::time::Duration;

pub use server::{ServerConfig, UploadServer};

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("WebSocket upgrade not completed within {0:?}")]
    HandshakeTimeout(Duration),

    #[error(transparent)]
    Transport(#[from] stowage_upload::TransportError),
}
