use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Chunk upload endpoint (multipart POST).
pub const UPLOAD_CHUNK_PATH: &str = "/api/file/upload-chunk";

/// File listing endpoint.
pub const FILES_PATH: &str = "/api/file";

/// Multipart field carrying the raw chunk bytes.
pub const FILE_FIELD: &str = "file";

/// Multipart field carrying the JSON-encoded [`ChunkMetadata`](crate::ChunkMetadata).
pub const METADATA_FIELD: &str = "metadata";

/// Filename used when a download response has no usable `Content-Disposition`.
pub const DEFAULT_DOWNLOAD_NAME: &str = "downloaded_file";

/// Default timeout for a single request, chunk uploads included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Chunk stored by the assembly service.
pub const STATUS_CREATED: u16 = 201;
/// Bearer token missing, expired or invalid.
pub const STATUS_UNAUTHORIZED: u16 = 401;
/// Chunk rejected (checksum mismatch, bad metadata). Safe to resend.
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// How the client treats a chunk upload response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    /// `201`: the chunk is stored, advance to the next one.
    Accepted,
    /// `422`: the chunk was refused; resend the same range.
    Rejected,
    /// `401`: the session must stop and re-authenticate.
    Unauthorized,
    /// Any other status.
    Unclassified,
}

impl ResponseClass {
    /// Classifies an HTTP status code returned by the upload endpoint.
    pub fn from_status(status: u16) -> Self {
        match status {
            STATUS_CREATED => Self::Accepted,
            STATUS_UNPROCESSABLE => Self::Rejected,
            STATUS_UNAUTHORIZED => Self::Unauthorized,
            _ => Self::Unclassified,
        }
    }

    /// Returns `true` if the same chunk may be sent again.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Rejected | Self::Unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_statuses() {
        assert_eq!(ResponseClass::from_status(201), ResponseClass::Accepted);
        assert_eq!(ResponseClass::from_status(422), ResponseClass::Rejected);
        assert_eq!(ResponseClass::from_status(401), ResponseClass::Unauthorized);
    }

    #[test]
    fn other_statuses_are_unclassified() {
        // 200 is a success elsewhere in the API but not a chunk acknowledgment.
        for status in [200, 400, 404, 429, 500, 502, 503] {
            assert_eq!(
                ResponseClass::from_status(status),
                ResponseClass::Unclassified,
                "status {status}"
            );
        }
    }

    #[test]
    fn retryable_classes() {
        assert!(ResponseClass::Rejected.is_retryable());
        assert!(ResponseClass::Unclassified.is_retryable());
        assert!(!ResponseClass::Accepted.is_retryable());
        assert!(!ResponseClass::Unauthorized.is_retryable());
    }

    #[test]
    fn response_class_serde() {
        let json = serde_json::to_string(&ResponseClass::Unauthorized).unwrap();
        assert_eq!(json, r#""unauthorized""#);
    }
}
