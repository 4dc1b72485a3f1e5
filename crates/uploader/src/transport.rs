//! Transport abstraction for chunk requests.

use std::future::Future;
use std::pin::Pin;

use chunkup_protocol::{ChunkPayload, ChunkResponse};

/// Failures below the HTTP status level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// The auth layer refused the request before it reached the endpoint.
    #[error("unauthorized")]
    Unauthorized,
}

/// Sends one chunk to the upload endpoint.
///
/// The app implements this on top of its HTTP client (bearer token,
/// timeouts). Using a trait keeps the upload logic decoupled from the
/// transport and testable with mocks.
pub trait ChunkTransport: Send + Sync {
    /// Performs one exchange and returns the status and body verbatim.
    ///
    /// Non-2xx statuses are *not* errors at this level; only failures to
    /// get a response at all are.
    fn send_chunk(
        &self,
        payload: ChunkPayload,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkResponse, TransportError>> + Send + '_>>;
}
