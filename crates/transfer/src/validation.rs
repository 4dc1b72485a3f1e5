use std::path::{Component, Path};

use chunkup_protocol::ChunkMetadata;

use crate::TransferError;

/// Validates the file name sent with every chunk.
///
/// The service joins it directly onto its upload directory, so it must be
/// a single plain path component. Rejects:
/// - Empty names
/// - Path separators (`/` or `\`)
/// - `.` and `..`
/// - NUL bytes
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidFileName("empty name".into()));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidFileName(format!(
            "path separators not allowed: {name}"
        )));
    }

    if name.contains('\0') {
        return Err(TransferError::InvalidFileName(format!(
            "NUL byte not allowed: {name:?}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidFileName(format!(
            "not a plain file name: {name}"
        ))),
    }
}

/// Extensions accepted for upload: common images and PDF.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "pdf"];

/// Checks that `name` carries one of [`ALLOWED_EXTENSIONS`], ignoring case.
pub fn validate_file_type(name: &str) -> Result<(), TransferError> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(TransferError::UnsupportedFileType(name.to_string())),
    }
}

/// Checks chunk metadata before it is sent.
pub fn validate_metadata(meta: &ChunkMetadata) -> Result<(), TransferError> {
    if meta.file_id.is_empty() {
        return Err(TransferError::InvalidMetadata("empty file id".into()));
    }

    validate_file_name(&meta.file_name)
        .map_err(|e| TransferError::InvalidMetadata(e.to_string()))?;

    if meta.offset >= meta.limit {
        return Err(TransferError::InvalidMetadata(format!(
            "empty range [{}, {})",
            meta.offset, meta.limit
        )));
    }

    if meta.limit > meta.file_size {
        return Err(TransferError::InvalidMetadata(format!(
            "limit {} past end of file ({} bytes)",
            meta.limit, meta.file_size
        )));
    }

    let hex_ok = meta.check_sum.len() == 64
        && meta
            .check_sum
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if !hex_ok {
        return Err(TransferError::InvalidMetadata(format!(
            "checksum is not lower-case SHA-256 hex: {}",
            meta.check_sum
        )));
    }

    Ok(())
}
