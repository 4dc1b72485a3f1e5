use serde::{Deserialize, Serialize};

use crate::constants::ResponseClass;

// ---------------------------------------------------------------------------
// Chunk upload
// ---------------------------------------------------------------------------

/// Metadata sent alongside every chunk, JSON-encoded in the `metadata` field.
///
/// `limit` equal to `file_size` tells the service this is the last byte
/// range and triggers assembly of the stored chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub order: u64,
    /// Session token shared by every chunk of one upload.
    pub file_id: String,
    pub offset: u64,
    pub limit: u64,
    pub file_size: u64,
    pub file_name: String,
    /// SHA-256 of the chunk bytes, lower-case hex.
    pub check_sum: String,
}

impl ChunkMetadata {
    /// Number of bytes covered by this chunk.
    pub fn len(&self) -> u64 {
        self.limit.saturating_sub(self.offset)
    }

    /// Returns `true` if the chunk covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if this chunk ends at the last byte of the file.
    pub fn is_last(&self) -> bool {
        self.limit == self.file_size
    }
}

/// The unit actually transmitted: one chunk's bytes and their metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    pub metadata: ChunkMetadata,
    pub data: Vec<u8>,
}

impl ChunkPayload {
    /// JSON text for the `metadata` multipart field.
    pub fn metadata_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.metadata)
    }
}

/// Raw outcome of one chunk request as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResponse {
    pub status: u16,
    pub body: String,
}

impl ChunkResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Classification of [`status`](Self::status).
    pub fn class(&self) -> ResponseClass {
        ResponseClass::from_status(self.status)
    }

    /// Extracts the service's `{"error": ...}` message, if the body has one.
    pub fn error_message(&self) -> Option<String> {
        serde_json::from_str::<ErrorBody>(&self.body)
            .ok()
            .map(|b| b.error)
    }
}

/// Error body returned by the service on failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// File service
// ---------------------------------------------------------------------------

/// Envelope wrapping every successful JSON payload: `{"data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// A stored file as reported by the listing and metadata endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> ChunkMetadata {
        ChunkMetadata {
            order: 2,
            file_id: "0b7c4b3e-5a7e-4a53-9d1d-1f0e0c3f1a11".into(),
            offset: 1_000_000,
            limit: 1_200_000,
            file_size: 1_200_000,
            file_name: "report.pdf".into(),
            check_sum: "ab".repeat(32),
        }
    }

    #[test]
    fn chunk_metadata_field_names() {
        let json = serde_json::to_string(&sample_metadata()).unwrap();
        for field in [
            "\"order\"",
            "\"fileId\"",
            "\"offset\"",
            "\"limit\"",
            "\"fileSize\"",
            "\"fileName\"",
            "\"checkSum\"",
        ] {
            assert!(json.contains(field), "missing {field} in {json}");
        }
    }

    #[test]
    fn chunk_metadata_parses_service_shape() {
        let json = r#"{"order":0,"fileId":"f","offset":0,"limit":10,"fileSize":30,"fileName":"a.png","checkSum":"00"}"#;
        let meta: ChunkMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.order, 0);
        assert_eq!(meta.len(), 10);
        assert!(!meta.is_last());
    }

    #[test]
    fn chunk_metadata_last_chunk() {
        let meta = sample_metadata();
        assert!(meta.is_last());
        assert_eq!(meta.len(), 200_000);
        assert!(!meta.is_empty());
    }

    #[test]
    fn payload_metadata_json_parses_back() {
        let payload = ChunkPayload {
            metadata: sample_metadata(),
            data: vec![1, 2, 3],
        };
        let json = payload.metadata_json().unwrap();
        let parsed: ChunkMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload.metadata);
    }

    #[test]
    fn chunk_response_error_message() {
        let resp = ChunkResponse::new(422, r#"{"error":"Invalid checksum value"}"#);
        assert_eq!(resp.class(), ResponseClass::Rejected);
        assert_eq!(resp.error_message().as_deref(), Some("Invalid checksum value"));

        let plain = ChunkResponse::new(502, "Bad Gateway");
        assert!(plain.error_message().is_none());
    }

    #[test]
    fn file_listing_parses() {
        let json = r#"{"data":[
            {"id":7,"user_id":"3","path":"http://localhost/uploads/a.png","filename":"a.png","size":2048,"mime_type":"image/png","created_at":"2025-01-01 10:00:00"},
            {"id":8,"filename":"b.pdf","size":10,"mime_type":"application/pdf","created_at":"2025-01-02 10:00:00"}
        ]}"#;
        let resp: ApiResponse<Vec<FileRecord>> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.data.len(), 2);
        assert_eq!(resp.data[0].mime_type, "image/png");
        assert_eq!(resp.data[1].path, "");
    }

    #[test]
    fn file_record_omit_empty() {
        let record = FileRecord {
            id: 1,
            filename: "a".into(),
            size: 1,
            mime_type: "text/plain".into(),
            created_at: "now".into(),
            user_id: String::new(),
            path: String::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("user_id"));
        assert!(!json.contains("path"));
    }
}
