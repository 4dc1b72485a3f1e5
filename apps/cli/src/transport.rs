//! Bridges the uploader's transport trait to the HTTP client.

use std::future::Future;
use std::pin::Pin;

use chunkup_api::{Client, Error};
use chunkup_protocol::{ChunkPayload, ChunkResponse};
use chunkup_uploader::{ChunkTransport, TransportError};

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ChunkTransport for HttpTransport {
    fn send_chunk(
        &self,
        payload: ChunkPayload,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkResponse, TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .upload_chunk(payload)
                .await
                .map_err(to_transport_error)
        })
    }
}

fn to_transport_error(err: Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    match err {
        Error::Unauthorized => TransportError::Unauthorized,
        other => TransportError::Network(other.to_string()),
    }
}
