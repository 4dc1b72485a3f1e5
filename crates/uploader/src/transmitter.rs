//! Sends one planned range and classifies the result.

use std::future::Future;
use std::pin::Pin;

use chunkup_protocol::{ChunkPayload, ResponseClass};
use chunkup_transfer::{
    ByteSource, ChunkRange, TransferError, UploadSession, compute_checksum, validate_metadata,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::UploadError;
use crate::transport::{ChunkTransport, TransportError};

/// Classified result of one chunk exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Stored by the service; the session may advance.
    Accepted,
    /// Refused by the service (`422`); resend the same range.
    Rejected { reason: String },
    /// Authentication is required; the session must stop.
    Unauthorized,
    /// No response, or a status the client does not recognize.
    TransportFailure { reason: String },
}

impl ChunkOutcome {
    /// Returns `true` if the same range may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::TransportFailure { .. })
    }

    /// Human-readable reason for a non-accepted outcome.
    pub fn reason(&self) -> &str {
        match self {
            Self::Accepted => "accepted",
            Self::Unauthorized => "unauthorized",
            Self::Rejected { reason } | Self::TransportFailure { reason } => reason,
        }
    }
}

/// Hashes a chunk off the async runtime, handing the buffer back.
pub(crate) type ChecksumFn =
    fn(Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(Vec<u8>, String), TransferError>> + Send>>;

pub(crate) fn sha256_checksum(
    data: Vec<u8>,
) -> Pin<Box<dyn Future<Output = Result<(Vec<u8>, String), TransferError>> + Send>> {
    Box::pin(compute_checksum(data))
}

/// Reads, checksums and sends single ranges.
///
/// Never mutates the session; the controller applies the outcome.
pub struct ChunkTransmitter<'a> {
    transport: &'a dyn ChunkTransport,
    source: &'a dyn ByteSource,
    checksum: ChecksumFn,
}

impl<'a> ChunkTransmitter<'a> {
    pub fn new(transport: &'a dyn ChunkTransport, source: &'a dyn ByteSource) -> Self {
        Self {
            transport,
            source,
            checksum: sha256_checksum,
        }
    }

    pub(crate) fn with_checksum(mut self, checksum: ChecksumFn) -> Self {
        self.checksum = checksum;
        self
    }

    /// Sends `range` once.
    ///
    /// `cancel` is checked before each suspension point (read, checksum,
    /// request). A request already in flight is never interrupted.
    pub async fn send(
        &self,
        session: &UploadSession,
        range: &ChunkRange,
        cancel: &CancellationToken,
    ) -> Result<ChunkOutcome, UploadError> {
        check_cancelled(cancel)?;
        let data = self.source.read_range(range.offset, range.limit).await?;

        check_cancelled(cancel)?;
        let (data, checksum) = (self.checksum)(data)
            .await
            .map_err(|e| checksum_error(range.order, e))?;

        let metadata = session.chunk_metadata(range, checksum)?;
        validate_metadata(&metadata)?;

        check_cancelled(cancel)?;
        trace!(
            order = range.order,
            offset = range.offset,
            limit = range.limit,
            "sending chunk"
        );
        let result = self
            .transport
            .send_chunk(ChunkPayload { metadata, data })
            .await;

        let outcome = classify(result);
        debug!(order = range.order, outcome = ?outcome, "chunk exchange finished");
        Ok(outcome)
    }
}

/// Maps a transport result onto a chunk outcome.
pub(crate) fn classify(
    result: Result<chunkup_protocol::ChunkResponse, TransportError>,
) -> ChunkOutcome {
    match result {
        Ok(resp) => match resp.class() {
            ResponseClass::Accepted => ChunkOutcome::Accepted,
            ResponseClass::Unauthorized => ChunkOutcome::Unauthorized,
            ResponseClass::Rejected => ChunkOutcome::Rejected {
                reason: resp
                    .error_message()
                    .unwrap_or_else(|| format!("status {}", resp.status)),
            },
            ResponseClass::Unclassified => ChunkOutcome::TransportFailure {
                reason: match resp.error_message() {
                    Some(msg) => format!("status {}: {msg}", resp.status),
                    None => format!("status {}", resp.status),
                },
            },
        },
        Err(TransportError::Unauthorized) => ChunkOutcome::Unauthorized,
        Err(e) => ChunkOutcome::TransportFailure {
            reason: e.to_string(),
        },
    }
}

/// Attributes a failed hash to the chunk it was computed for.
fn checksum_error(order: u64, err: TransferError) -> UploadError {
    match err {
        TransferError::Checksum(reason) => UploadError::ChecksumComputation { order, reason },
        other => UploadError::Transfer(other),
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), UploadError> {
    if cancel.is_cancelled() {
        Err(UploadError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkup_protocol::ChunkResponse;
    use chunkup_transfer::{MemorySource, RetryPolicy, checksum_bytes};
    use std::sync::Mutex;

    /// Mock transport that records payloads and replays canned results.
    struct MockTransport {
        results: Mutex<Vec<Result<ChunkResponse, TransportError>>>,
        payloads: Mutex<Vec<ChunkPayload>>,
    }

    impl MockTransport {
        fn new(results: Vec<Result<ChunkResponse, TransportError>>) -> Self {
            Self {
                results: Mutex::new(results),
                payloads: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChunkTransport for MockTransport {
        fn send_chunk(
            &self,
            payload: ChunkPayload,
        ) -> Pin<Box<dyn Future<Output = Result<ChunkResponse, TransportError>> + Send + '_>>
        {
            self.payloads.lock().unwrap().push(payload);
            Box::pin(async move {
                let mut results = self.results.lock().unwrap();
                if results.is_empty() {
                    Err(TransportError::Network("no mock response".into()))
                } else {
                    results.remove(0)
                }
            })
        }
    }

    fn started_session(total: u64, chunk: u64) -> UploadSession {
        let mut s = UploadSession::new("notes.txt", total, chunk, RetryPolicy::immediate(3)).unwrap();
        s.start().unwrap();
        s
    }

    #[tokio::test]
    async fn builds_payload_for_range() {
        let transport = MockTransport::new(vec![Ok(ChunkResponse::new(201, ""))]);
        let source = MemorySource::new(b"0123456789ABCDE".to_vec());
        let session = started_session(15, 10);
        let last = session.ranges()[1];

        let tx = ChunkTransmitter::new(&transport, &source);
        let outcome = tx
            .send(&session, &last, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Accepted);

        let payloads = transport.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        let p = &payloads[0];
        assert_eq!(p.data, b"ABCDE");
        assert_eq!(p.metadata.order, 1);
        assert_eq!(p.metadata.offset, 10);
        assert_eq!(p.metadata.limit, 15);
        assert_eq!(p.metadata.file_size, 15);
        assert_eq!(p.metadata.file_name, "notes.txt");
        assert_eq!(p.metadata.file_id, session.id());
        assert_eq!(p.metadata.check_sum, checksum_bytes(b"ABCDE"));
    }

    #[tokio::test]
    async fn classifies_statuses() {
        let transport = MockTransport::new(vec![
            Ok(ChunkResponse::new(422, r#"{"error":"Invalid checksum value"}"#)),
            Ok(ChunkResponse::new(401, "")),
            Ok(ChunkResponse::new(500, r#"{"error":"Failed to upload chunk file"}"#)),
            Err(TransportError::Timeout),
        ]);
        let source = MemorySource::new(vec![7u8; 10]);
        let session = started_session(10, 10);
        let range = session.ranges()[0];
        let tx = ChunkTransmitter::new(&transport, &source);
        let cancel = CancellationToken::new();

        assert_eq!(
            tx.send(&session, &range, &cancel).await.unwrap(),
            ChunkOutcome::Rejected {
                reason: "Invalid checksum value".into()
            }
        );
        assert_eq!(
            tx.send(&session, &range, &cancel).await.unwrap(),
            ChunkOutcome::Unauthorized
        );
        assert_eq!(
            tx.send(&session, &range, &cancel).await.unwrap(),
            ChunkOutcome::TransportFailure {
                reason: "status 500: Failed to upload chunk file".into()
            }
        );
        assert_eq!(
            tx.send(&session, &range, &cancel).await.unwrap(),
            ChunkOutcome::TransportFailure {
                reason: "request timed out".into()
            }
        );
    }

    #[test]
    fn transport_unauthorized_is_fatal() {
        let outcome = classify(Err(TransportError::Unauthorized));
        assert_eq!(outcome, ChunkOutcome::Unauthorized);
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn success_200_is_not_an_acknowledgment() {
        let outcome = classify(Ok(ChunkResponse::new(200, "")));
        assert!(outcome.is_retryable());
        assert_eq!(outcome.reason(), "status 200");
    }

    #[tokio::test]
    async fn cancelled_before_send() {
        let transport = MockTransport::new(vec![Ok(ChunkResponse::new(201, ""))]);
        let source = MemorySource::new(vec![1u8; 10]);
        let session = started_session(10, 10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ChunkTransmitter::new(&transport, &source)
            .send(&session, &session.ranges()[0], &cancel)
            .await;
        assert!(matches!(result, Err(UploadError::Cancelled)));
        assert!(transport.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unstarted_session_is_rejected() {
        let transport = MockTransport::new(vec![Ok(ChunkResponse::new(201, ""))]);
        let source = MemorySource::new(vec![1u8; 10]);
        let session =
            UploadSession::new("a.bin", 10, 10, RetryPolicy::immediate(3)).unwrap();

        let result = ChunkTransmitter::new(&transport, &source)
            .send(&session, &session.ranges()[0], &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(UploadError::Transfer(TransferError::NotStarted))
        ));
        assert!(transport.payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn checksum_failure_names_the_chunk() {
        let err = checksum_error(4, TransferError::Checksum("task panicked".into()));
        assert!(matches!(
            &err,
            UploadError::ChecksumComputation { order: 4, reason } if reason == "task panicked"
        ));
        assert_eq!(
            err.to_string(),
            "checksum computation failed for chunk 4: task panicked"
        );

        let other = checksum_error(4, TransferError::EmptyFile);
        assert!(matches!(other, UploadError::Transfer(TransferError::EmptyFile)));
    }

    #[tokio::test]
    async fn checksum_failure_skips_request() {
        fn failing(
            _: Vec<u8>,
        ) -> Pin<Box<dyn Future<Output = Result<(Vec<u8>, String), TransferError>> + Send>>
        {
            Box::pin(async { Err(TransferError::Checksum("hasher gone".into())) })
        }

        let transport = MockTransport::new(vec![Ok(ChunkResponse::new(201, ""))]);
        let source = MemorySource::new(vec![1u8; 10]);
        let session = started_session(10, 10);

        let result = ChunkTransmitter::new(&transport, &source)
            .with_checksum(failing)
            .send(&session, &session.ranges()[0], &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(UploadError::ChecksumComputation { order: 0, .. })
        ));
        assert!(transport.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_source_is_fatal() {
        let transport = MockTransport::new(vec![Ok(ChunkResponse::new(201, ""))]);
        let source = MemorySource::new(vec![1u8; 5]);
        let session = started_session(10, 10);

        let result = ChunkTransmitter::new(&transport, &source)
            .send(&session, &session.ranges()[0], &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(UploadError::Transfer(TransferError::RangeOutOfBounds { .. }))
        ));
    }
}
