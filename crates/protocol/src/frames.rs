//! Text frames exchanged outside the binary chunk stream.

use crate::constants::{CANCEL, COMPLETED, NEXT, UPLOAD_COMPLETED};
use crate::types::StatusMessage;

/// A text frame written by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// JSON-encoded [`StatusMessage`].
    Status(StatusMessage),
    /// Literal `NEXT`: send the next chunk.
    Next,
    /// Literal `UPLOAD_COMPLETED`: all bytes received, finalizing.
    UploadCompleted,
    /// Literal `COMPLETED`: ready for the next handshake.
    Completed,
}

impl ServerFrame {
    /// Renders the frame as the text payload sent on the wire.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            ServerFrame::Status(status) => status.to_json(),
            ServerFrame::Next => Ok(NEXT.to_string()),
            ServerFrame::UploadCompleted => Ok(UPLOAD_COMPLETED.to_string()),
            ServerFrame::Completed => Ok(COMPLETED.to_string()),
        }
    }
}

impl From<StatusMessage> for ServerFrame {
    fn from(status: StatusMessage) -> Self {
        ServerFrame::Status(status)
    }
}

/// Classification of a text frame received while chunks are expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientText<'a> {
    Cancel,
    Other(&'a str),
}

impl<'a> ClientText<'a> {
    pub fn classify(text: &'a str) -> Self {
        if text.trim() == CANCEL {
            ClientText::Cancel
        } else {
            ClientText::Other(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_frames() {
        assert_eq!(ServerFrame::Next.to_text().unwrap(), "NEXT");
        assert_eq!(
            ServerFrame::UploadCompleted.to_text().unwrap(),
            "UPLOAD_COMPLETED"
        );
        assert_eq!(ServerFrame::Completed.to_text().unwrap(), "COMPLETED");
    }

    #[test]
    fn status_frame_is_json() {
        let frame: ServerFrame = StatusMessage::new(400, "Upload canceled").into();
        assert_eq!(
            frame.to_text().unwrap(),
            r#"{"code":400,"status":"Upload canceled"}"#
        );
    }

    #[test]
    fn classify_cancel() {
        assert_eq!(ClientText::classify("CANCEL"), ClientText::Cancel);
        assert_eq!(ClientText::classify("CANCEL\n"), ClientText::Cancel);
    }

    #[test]
    fn classify_other() {
        assert_eq!(ClientText::classify("cancel"), ClientText::Other("cancel"));
        assert_eq!(
            ClientText::classify(r#"{"filename":"x"}"#),
            ClientText::Other(r#"{"filename":"x"}"#)
        );
    }
}
