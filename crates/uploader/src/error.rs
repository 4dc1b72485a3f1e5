//! Upload error types.

use chunkup_transfer::TransferError;

/// Errors that end an upload run.
///
/// Retryable chunk failures only surface here once the retry budget is
/// spent ([`BudgetExhausted`](Self::BudgetExhausted)).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("checksum computation failed for chunk {order}: {reason}")]
    ChecksumComputation { order: u64, reason: String },

    #[error("unauthorized: re-authentication required")]
    Unauthorized,

    #[error("retry budget exhausted on chunk {order} after {failures} failures: {last}")]
    BudgetExhausted {
        order: u64,
        failures: u32,
        last: String,
    },

    #[error("no file associated with the session")]
    NoSource,

    #[error("cancelled")]
    Cancelled,
}
