//! Wire types shared by the chunked upload client and the file service API.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::ResponseClass;
pub use messages::{
    ApiResponse, ChunkMetadata, ChunkPayload, ChunkResponse, ErrorBody, FileRecord,
};
pub use types::{UploadProgress, UploadState};
