use stowage_protocol::{StatusMessage, UploadHeader};
use tracing::debug;

use crate::{Frame, FrameReader, FrameWriter, UploadError, Violation};

/// Greets the client with `READY` and reads its upload header.
///
/// The header must arrive as one text frame carrying a non-empty filename
/// and a positive size. Anything else is a [`Violation`]; the caller
/// reports it and may greet again.
pub async fn handshake(
    reader: &mut FrameReader,
    writer: &FrameWriter,
) -> Result<UploadHeader, UploadError> {
    writer.send(&StatusMessage::ready().into()).await?;

    let text = match reader.recv().await? {
        Frame::Text(text) => text,
        Frame::Binary(data) => {
            debug!(bytes = data.len(), "binary frame where a header was expected");
            return Err(Violation::HeaderNotText.into());
        }
    };

    let header = UploadHeader::parse(&text).map_err(Violation::from)?;
    debug!(filename = %header.filename, size = header.size, "upload header accepted");
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split_socket;
    use crate::testing::{TestClient, ws_pair};
    use stowage_protocol::ProtocolError;

    async fn handshake_with(message: ClientMessage) -> Result<UploadHeader, UploadError> {
        let (server, client) = ws_pair().await;
        let (mut reader, writer) = split_socket(server, None);
        let mut client = TestClient::new(client);

        let server = tokio::spawn(async move { handshake(&mut reader, &writer).await });
        client.expect_ready().await;
        match message {
            ClientMessage::Text(text) => client.send_text(text).await,
            ClientMessage::Binary(data) => client.send_binary(data).await,
        }
        server.await.unwrap()
    }

    enum ClientMessage {
        Text(&'static str),
        Binary(Vec<u8>),
    }

    #[tokio::test]
    async fn accepts_valid_header() {
        let header = handshake_with(ClientMessage::Text(r#"{"filename":"a.bin","size":42}"#))
            .await
            .unwrap();
        assert_eq!(header.filename, "a.bin");
        assert_eq!(header.size, 42);
    }

    #[tokio::test]
    async fn rejects_binary_header() {
        let err = handshake_with(ClientMessage::Binary(vec![1, 2])).await.unwrap_err();
        assert!(matches!(err, UploadError::Protocol(Violation::HeaderNotText)));
    }

    #[tokio::test]
    async fn rejects_unparseable_header() {
        let err = handshake_with(ClientMessage::Text("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Protocol(Violation::Header(ProtocolError::InvalidHeader(_)))
        ));
    }

    #[tokio::test]
    async fn rejects_empty_filename() {
        let err = handshake_with(ClientMessage::Text(r#"{"filename":"","size":1}"#))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Filename cannot be empty");
    }

    #[tokio::test]
    async fn rejects_zero_size() {
        let err = handshake_with(ClientMessage::Text(r#"{"filename":"a","size":0}"#))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload file is empty");
    }

    #[tokio::test]
    async fn closed_connection_is_transport_error() {
        let (server, client) = ws_pair().await;
        let (mut reader, writer) = split_socket(server, None);
        let mut client = TestClient::new(client);

        let server = tokio::spawn(async move { handshake(&mut reader, &writer).await });
        client.expect_ready().await;
        client.close().await;

        let err = server.await.unwrap().unwrap_err();
        assert!(matches!(err, UploadError::Transport(e) if e.is_disconnect()));
    }
}
