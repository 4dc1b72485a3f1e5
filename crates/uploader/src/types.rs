//! Data types for the upload flow.

use std::time::Duration;

use chunkup_protocol::UploadState;
use chunkup_transfer::{DEFAULT_CHUNK_SIZE, MAX_FILE_SIZE, RetryPolicy};

/// Config passed to the upload controller.
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderConfig {
    /// Bytes per chunk, fixed for the session's lifetime.
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    /// Largest accepted file; 0 disables the check.
    pub max_file_size: u64,
    /// Only accept images and PDF files.
    pub restrict_file_types: bool,
    /// Capacity of the event channel.
    pub event_capacity: usize,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            max_file_size: MAX_FILE_SIZE,
            restrict_file_types: true,
            event_capacity: 256,
        }
    }
}

/// Event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// The session moved to a new state.
    StateChanged {
        session_id: String,
        state: UploadState,
    },
    /// A chunk was acknowledged by the service.
    ChunkAccepted {
        order: u64,
        sent: u64,
        total: u64,
        progress: f64,
    },
    /// A chunk failed and will be sent again after `delay`.
    Retrying {
        order: u64,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// Every chunk was acknowledged.
    Completed { session_id: String },
    /// The session failed and will not be retried.
    Failed { session_id: String, error: String },
}

/// How a start/resume run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Paused,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = UploaderConfig::default();
        assert_eq!(config.chunk_size, 500_000);
        assert_eq!(config.retry.budget, 3);
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert!(config.restrict_file_types);
        assert_eq!(config.event_capacity, 256);
    }
}
