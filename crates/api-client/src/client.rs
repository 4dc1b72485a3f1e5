//! File service API client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkup_protocol::constants::{
    DEFAULT_REQUEST_TIMEOUT, FILE_FIELD, FILES_PATH, METADATA_FIELD, UPLOAD_CHUNK_PATH,
};
use chunkup_protocol::{ApiResponse, ChunkPayload, ChunkResponse, FileRecord};
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::disposition::filename_from_disposition;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Errors from the file service client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unauthorized: please log in again")]
    Unauthorized,

    #[error("invalid access token")]
    InvalidToken,
}

impl Error {
    /// Returns `true` if the request hit the client timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

/// File service API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a new client with the given access token.
    pub fn new(token: &str) -> Result<Self, Error> {
        Self::with_timeout(token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client whose requests time out after `timeout`.
    pub fn with_timeout(token: &str, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Sets the service root, e.g. `https://files.example.com`.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends one chunk as `multipart/form-data`.
    ///
    /// Every status is returned as a [`ChunkResponse`]; classifying it is
    /// up to the caller. Only failures to get a response are errors.
    pub async fn upload_chunk(&self, payload: ChunkPayload) -> Result<ChunkResponse, Error> {
        let metadata = payload.metadata_json()?;
        let order = payload.metadata.order;
        let file = Part::bytes(payload.data).file_name(payload.metadata.file_name);
        let form = Form::new()
            .part(FILE_FIELD, file)
            .text(METADATA_FIELD, metadata);

        let resp = self
            .http
            .post(self.url(UPLOAD_CHUNK_PATH))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        debug!(order, status, "chunk upload response");

        Ok(ChunkResponse::new(status, body))
    }

    /// Lists the caller's files.
    pub async fn list_files(&self) -> Result<Vec<FileRecord>, Error> {
        let resp: ApiResponse<Vec<FileRecord>> = self.get_json(FILES_PATH).await?;
        Ok(resp.data)
    }

    /// Returns the stored metadata of one file.
    pub async fn file_metadata(&self, id: i64) -> Result<FileRecord, Error> {
        let resp: ApiResponse<FileRecord> = self
            .get_json(&format!("{FILES_PATH}/metadata/{id}"))
            .await?;
        Ok(resp.data)
    }

    /// Downloads a file into `dir`, streaming it to disk.
    ///
    /// The name comes from the response's `Content-Disposition`. Bytes are
    /// written to a `.part` file that is renamed once complete and removed
    /// if anything fails first. Returns the final path.
    pub async fn download(&self, id: i64, dir: &Path) -> Result<PathBuf, Error> {
        let resp = self
            .http
            .get(self.url(&format!("{FILES_PATH}/download/{id}")))
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let name = filename_from_disposition(
            resp.headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
        );
        let target = dir.join(&name);
        let partial = dir.join(format!("{name}.part"));

        match write_download(resp, &partial, &target).await {
            Ok(written) => {
                info!(id, path = %target.display(), bytes = written, "file downloaded");
                Ok(target)
            }
            Err(e) => {
                match tokio::fs::remove_file(&partial).await {
                    Ok(()) => debug!(path = %partial.display(), "partial download removed"),
                    Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                    Err(rm) => {
                        debug!(path = %partial.display(), error = %rm, "partial download not removed")
                    }
                }
                Err(e)
            }
        }
    }

    /// Deletes a file.
    pub async fn delete(&self, id: i64) -> Result<(), Error> {
        let resp = self
            .http
            .delete(self.url(&format!("{FILES_PATH}/{id}")))
            .send()
            .await?;
        check_status(resp).await?;
        info!(id, "file deleted");
        Ok(())
    }

    /// Performs an authenticated GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self.http.get(self.url(path)).send().await?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Streams the body into `partial`, then moves it onto `target`.
async fn write_download(resp: Response, partial: &Path, target: &Path) -> Result<u64, Error> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut written: u64 = 0;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(partial, target).await?;
    Ok(written)
}

/// Maps 401 to [`Error::Unauthorized`] and other failures to [`Error::Api`].
async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
