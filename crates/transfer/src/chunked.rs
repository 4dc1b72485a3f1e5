use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::TransferError;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hashes `data` on the blocking pool and hands the buffer back with its digest.
pub async fn compute_checksum(data: Vec<u8>) -> Result<(Vec<u8>, String), TransferError> {
    tokio::task::spawn_blocking(move || {
        let checksum = checksum_bytes(&data);
        (data, checksum)
    })
    .await
    .map_err(|e| TransferError::Checksum(e.to_string()))
}

// ---------------------------------------------------------------------------
// Byte sources
// ---------------------------------------------------------------------------

/// Read-only bytes being uploaded.
///
/// A source is associated with exactly one session; ranges are requested
/// strictly one at a time.
pub trait ByteSource: Send + Sync {
    /// Total size in bytes.
    fn len(&self) -> u64;

    /// Returns `true` if the source has no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly the bytes in `[offset, limit)`.
    fn read_range(
        &self,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>>;
}

fn check_bounds(offset: u64, limit: u64, len: u64) -> Result<(), TransferError> {
    if offset > limit || limit > len {
        return Err(TransferError::RangeOutOfBounds { offset, limit, len });
    }
    Ok(())
}

/// A file on disk opened for ranged reads.
pub struct FileSource {
    file: Mutex<tokio::fs::File>,
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Opens `path` and records its current size.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            len,
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component, used as the uploaded file name.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(
        &self,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>> {
        Box::pin(async move {
            check_bounds(offset, limit, self.len)?;

            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(offset)).await?;
            let mut buf = vec![0u8; (limit - offset) as usize];
            // Fails with UnexpectedEof if the file shrank after opening.
            file.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }
}

/// An in-memory buffer.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(
        &self,
        offset: u64,
        limit: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>> {
        Box::pin(async move {
            check_bounds(offset, limit, self.len())?;
            Ok(self.data[offset as usize..limit as usize].to_vec())
        })
    }
}
