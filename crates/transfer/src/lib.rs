//! Chunk planning, checksums and the upload session state machine.
//!
//! Everything here is transport-agnostic: the uploader crate drives a
//! [`UploadSession`] through the network, this crate only decides *what*
//! to send next and keeps the bookkeeping honest.

mod chunked;
mod plan;
mod progress;
mod retry;
mod session;
mod validation;

pub use chunked::{ByteSource, FileSource, MemorySource, checksum_bytes, compute_checksum};
pub use plan::{ChunkRange, plan, total_ranges};
pub use progress::{SpeedCalculator, format_file_size};
pub use retry::{BackoffConfig, ChunkRole, RetryBudget, RetryDecision, RetryPolicy};
pub use session::UploadSession;
pub use validation::{ALLOWED_EXTENSIONS, validate_file_name, validate_file_type, validate_metadata};

use chunkup_protocol::UploadState;

/// Default chunk size: 500,000 bytes.
pub const DEFAULT_CHUNK_SIZE: u64 = 500 * 1000;

/// Largest file accepted for upload by default: 100 MiB.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("file is empty")]
    EmptyFile,

    #[error("file too large: {size} bytes (maximum {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("unsupported file type: {0} (allowed: images and PDF)")]
    UnsupportedFileType(String),

    #[error("invalid chunk metadata: {0}")]
    InvalidMetadata(String),

    #[error("range [{offset}, {limit}) out of bounds for {len} bytes")]
    RangeOutOfBounds { offset: u64, limit: u64, len: u64 },

    #[error("checksum computation failed: {0}")]
    Checksum(String),

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: UploadState,
        action: &'static str,
    },

    #[error("chunk {got} acknowledged out of order (expected {expected})")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("session not started")]
    NotStarted,
}
