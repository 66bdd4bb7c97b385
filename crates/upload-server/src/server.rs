//! Upload WebSocket server.
//!
//! Listens on a TCP port, upgrades HTTP GET requests for the configured
//! route to WebSocket and runs upload sessions on every connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stowage_protocol::constants::{HANDSHAKE_TIMEOUT, UPLOAD_PATH, WS_MAX_MESSAGE_SIZE};
use stowage_upload::UploadService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::ServerError;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Route that is upgraded; every other path gets a 404.
    pub path: String,
    /// Time allowed for the HTTP upgrade.
    pub handshake_timeout: Duration,
    /// Largest accepted message and frame, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            path: UPLOAD_PATH.into(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
            max_message_size: WS_MAX_MESSAGE_SIZE,
        }
    }
}

/// The upload WebSocket server.
pub struct UploadServer {
    config: ServerConfig,
    service: Arc<UploadService>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    active: AtomicUsize,
}

impl UploadServer {
    pub fn new(config: ServerConfig, service: Arc<UploadService>) -> Arc<Self> {
        Arc::new(Self {
            config,
            service,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
            active: AtomicUsize::new(0),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Number of upgraded connections currently running sessions.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Stops accepting and closes every connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until [`shutdown`](Self::shutdown).
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let addr = SocketAddr::new(self.config.bind, self.config.port);
        let listener = TcpListener::bind(addr).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(path = %self.config.path, "upload server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            let span = tracing::info_span!("connection", peer = %peer_addr);
                            tokio::spawn(
                                async move {
                                    if let Err(e) = server.handle_connection(stream).await {
                                        tracing::error!("connection error: {e}");
                                    }
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Upgrades one TCP connection and serves upload sessions on it.
    async fn handle_connection(&self, stream: TcpStream) -> Result<(), ServerError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let route = self.config.path.as_str();
        let check_route = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            if req.uri().path() == route {
                return Ok(resp);
            }
            tracing::warn!(path = %req.uri().path(), "rejecting upgrade for unknown route");
            let mut err = ErrorResponse::new(Some("not found".into()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        };

        let upgrade = accept_hdr_async_with_config(stream, check_route, Some(ws_config));
        let ws_stream = tokio::time::timeout(self.config.handshake_timeout, upgrade)
            .await
            .map_err(|_| ServerError::HandshakeTimeout(self.config.handshake_timeout))??;
        tracing::info!("WebSocket connection established");

        self.active.fetch_add(1, Ordering::AcqRel);
        let result = self
            .service
            .serve_until(ws_stream, self.cancel.child_token())
            .await;
        self.active.fetch_sub(1, Ordering::AcqRel);

        let stored = result?;
        tracing::info!(stored, "connection closed");
        Ok(())
    }
}
