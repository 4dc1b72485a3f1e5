//! Chunked upload controller.
//!
//! Drives an [`UploadSession`](chunkup_transfer::UploadSession) over a
//! [`ChunkTransport`] provided by the caller. The crate has no HTTP
//! dependency; the app bridges the transport trait to a real client.
//!
//! # Flow
//!
//! 1. **Plan**: the session splits the source into byte ranges
//! 2. **Transmit**: read, checksum and send the next unsent range
//! 3. **Classify**: accepted, rejected, unauthorized or transport failure
//! 4. **Advance or retry**: per the session's retry budget
//! 5. **Complete**: once every range is acknowledged

pub mod controller;
pub mod error;
pub mod transmitter;
pub mod transport;
pub mod types;

// Re-export primary types for convenience.
pub use controller::{UploadController, UploadHandle};
pub use error::UploadError;
pub use transmitter::{ChunkOutcome, ChunkTransmitter};
pub use transport::{ChunkTransport, TransportError};
pub use types::{RunOutcome, UploadEvent, UploaderConfig};
