use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::{CODE_OK, STATUS_PART_COMPLETED, STATUS_READY};

/// Declares one file transfer: the object key and the exact byte count
/// the client is about to stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadHeader {
    #[serde(alias = "Filename")]
    pub filename: String,
    #[serde(alias = "Size")]
    pub size: u64,
}

impl UploadHeader {
    /// Decodes and validates a handshake header.
    ///
    /// The filename must be non-empty and the size strictly positive.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let header: UploadHeader = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidHeader(e.to_string()))?;
        header.validate()?;
        Ok(header)
    }

    /// Checks the invariants of a decoded header.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.filename.is_empty() {
            return Err(ProtocolError::EmptyFilename);
        }
        if self.size == 0 {
            return Err(ProtocolError::EmptyFile);
        }
        Ok(())
    }
}

/// The only structured message the server writes back.
///
/// Absent fields are omitted on the wire: progress updates carry no
/// `code`, status replies carry no `part`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<u64>,
}

impl StatusMessage {
    /// Creates a coded status reply.
    pub fn new(code: u16, status: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            status: status.into(),
            part: None,
        }
    }

    /// The greeting that opens a handshake.
    pub fn ready() -> Self {
        Self::new(CODE_OK, STATUS_READY)
    }

    /// A progress update. `part` is a completed-part count for multipart
    /// transfers and a percentage for single-part ones.
    pub fn progress(part: u64) -> Self {
        Self {
            code: None,
            status: STATUS_PART_COMPLETED.into(),
            part: Some(part),
        }
    }

    /// Serializes to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
