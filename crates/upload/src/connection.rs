//! Connection framer: one reader, many writers behind a single lock.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use stowage_protocol::{ServerFrame, StatusMessage};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, protocol::Message as WsMessage};
use tokio_util::sync::CancellationToken;

use crate::TransportError;

type WsSink = Pin<Box<dyn Sink<WsMessage, Error = tungstenite::Error> + Send>>;
type WsSource = Pin<Box<dyn Stream<Item = Result<WsMessage, tungstenite::Error>> + Send>>;

/// A data frame received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Splits a WebSocket into its reading and writing halves.
///
/// `idle_timeout` bounds every read; `None` waits forever.
pub fn split_socket<S>(ws: S, idle_timeout: Option<Duration>) -> (FrameReader, FrameWriter)
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>>
        + Sink<WsMessage, Error = tungstenite::Error>
        + Send
        + 'static,
{
    let (sink, stream) = ws.split();
    let reader = FrameReader {
        stream: Box::pin(stream),
        idle_timeout,
        shutdown: CancellationToken::new(),
    };
    (reader, FrameWriter::new(Box::pin(sink)))
}

/// Reading half of a connection. Only the session loop reads.
pub struct FrameReader {
    stream: WsSource,
    idle_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl FrameReader {
    /// Makes every read fail with [`TransportError::Shutdown`] once `token`
    /// is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Waits for the next text or binary frame.
    ///
    /// Control frames are skipped. A close frame or the end of the stream
    /// yields [`TransportError::Closed`].
    pub async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            let read = next_message(&mut self.stream, self.idle_timeout);
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(TransportError::Shutdown),
                next = read => next?,
            };

            match next {
                Some(Ok(WsMessage::Text(text))) => return Ok(Frame::Text(text.as_str().to_owned())),
                Some(Ok(WsMessage::Binary(data))) => return Ok(Frame::Binary(data.to_vec())),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

async fn next_message(
    stream: &mut WsSource,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<WsMessage, tungstenite::Error>>, TransportError> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| TransportError::IdleTimeout(limit)),
        None => Ok(stream.next().await),
    }
}

/// Writing half of a connection.
///
/// Cloneable. The session loop, the progress reporter and part workers all
/// write through the same lock, held for exactly one send.
#[derive(Clone)]
pub struct FrameWriter {
    sink: Arc<Mutex<WsSink>>,
}

impl FrameWriter {
    fn new(sink: WsSink) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Sends a server frame as text.
    pub async fn send(&self, frame: &ServerFrame) -> Result<(), TransportError> {
        let text = frame.to_text()?;
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    /// Sends a coded status reply.
    pub async fn send_status(&self, code: u16, status: impl Into<String>) -> Result<(), TransportError> {
        self.send(&StatusMessage::new(code, status).into()).await
    }

    /// Sends a close frame. Failures are ignored.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}
