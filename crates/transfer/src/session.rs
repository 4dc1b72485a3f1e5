use chrono::{DateTime, Utc};
use chunkup_protocol::{ChunkMetadata, UploadProgress, UploadState};
use tracing::{debug, info};

use crate::plan::{ChunkRange, plan};
use crate::progress::SpeedCalculator;
use crate::retry::{ChunkRole, RetryBudget, RetryDecision, RetryPolicy};
use crate::validation::validate_file_name;
use crate::TransferError;

/// State machine for one upload attempt of one file.
///
/// The session owns the chunk plan and the resumption cursor
/// (`sent_count`). It never touches the network: the controller reports
/// each outcome and the session decides what happens next.
#[derive(Debug)]
pub struct UploadSession {
    id: Option<String>,
    file_name: String,
    total_size: u64,
    chunk_size: u64,
    ranges: Vec<ChunkRange>,
    sent_count: u64,
    state: UploadState,
    retry: RetryPolicy,
    budget: Option<RetryBudget>,
    started_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    error: String,
    speed: SpeedCalculator,
}

impl UploadSession {
    /// Creates an idle session for `total_size` bytes named `file_name`.
    pub fn new(
        file_name: impl Into<String>,
        total_size: u64,
        chunk_size: u64,
        retry: RetryPolicy,
    ) -> Result<Self, TransferError> {
        let file_name = file_name.into();
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        if total_size == 0 {
            return Err(TransferError::EmptyFile);
        }
        validate_file_name(&file_name)?;

        Ok(Self {
            id: None,
            ranges: plan(total_size, chunk_size),
            file_name,
            total_size,
            chunk_size,
            sent_count: 0,
            state: UploadState::Idle,
            retry,
            budget: None,
            started_at: None,
            updated_at: Utc::now(),
            error: String::new(),
            speed: SpeedCalculator::default(),
        })
    }

    /// Starts or resumes the upload.
    ///
    /// The session id is generated on the first start only; resuming keeps
    /// it so the service can match the remaining chunks to those already
    /// stored. Each call begins a new send sequence with a fresh retry
    /// budget. Calling this while already uploading is a no-op.
    pub fn start(&mut self) -> Result<(), TransferError> {
        if !self.state.can_resume() {
            return Err(self.invalid("start"));
        }
        if self.state == UploadState::Uploading {
            return Ok(());
        }

        let id = self
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        let now = Utc::now();
        self.started_at.get_or_insert(now);
        self.updated_at = now;
        self.budget = None;
        self.speed.reset();
        self.speed.add_sample(0);
        info!(
            session = %id,
            file = %self.file_name,
            from = self.sent_count,
            total = self.ranges.len(),
            "upload {}",
            if self.state == UploadState::Idle { "started" } else { "resumed" }
        );
        self.state = UploadState::Uploading;
        Ok(())
    }

    /// Stops issuing new chunks. Only valid while uploading.
    pub fn pause(&mut self) -> Result<(), TransferError> {
        if self.state != UploadState::Uploading {
            return Err(self.invalid("pause"));
        }
        self.state = UploadState::Paused;
        self.updated_at = Utc::now();
        info!(session = %self.id(), sent = self.sent_count, "upload paused");
        Ok(())
    }

    /// Abandons the session locally. The service is not notified.
    pub fn cancel(&mut self) -> Result<(), TransferError> {
        if self.state.is_terminal() {
            return Err(self.invalid("cancel"));
        }
        self.state = UploadState::Cancelled;
        self.updated_at = Utc::now();
        info!(session = %self.id(), sent = self.sent_count, "upload cancelled");
        Ok(())
    }

    /// Marks the session as failed with an error message.
    pub fn fail(&mut self, err: &str) -> Result<(), TransferError> {
        if self.state != UploadState::Uploading {
            return Err(self.invalid("fail"));
        }
        self.state = UploadState::Failed;
        self.error = err.to_string();
        self.updated_at = Utc::now();
        info!(session = %self.id(), sent = self.sent_count, error = err, "upload failed");
        Ok(())
    }

    /// Records a success acknowledgment for the range with `order`.
    ///
    /// Only the next unsent range can be acknowledged. Returns the new
    /// state, which is `Completed` once every range is acknowledged.
    pub fn record_accepted(&mut self, order: u64) -> Result<UploadState, TransferError> {
        if self.state != UploadState::Uploading {
            return Err(self.invalid("acknowledge a chunk"));
        }
        if order != self.sent_count {
            return Err(TransferError::OutOfOrder {
                expected: self.sent_count,
                got: order,
            });
        }

        let bytes = self.ranges[order as usize].len();
        self.sent_count += 1;
        self.speed.add_sample(bytes);
        self.updated_at = Utc::now();
        debug!(session = %self.id(), order, sent = self.sent_count, "chunk acknowledged");

        if self.sent_count == self.total_ranges() {
            self.state = UploadState::Completed;
            self.budget = None;
            info!(session = %self.id(), chunks = self.sent_count, "upload completed");
        }
        Ok(self.state)
    }

    /// Records a retryable failure for `range`.
    ///
    /// Draws from the budget of the range's role, resetting it when the
    /// role changes (moving on to the final chunk).
    pub fn record_retryable_failure(&mut self, range: &ChunkRange) -> RetryDecision {
        let role = ChunkRole::of(range);
        let mut budget = match self.budget.take() {
            Some(b) if b.role() == role => b,
            _ => RetryBudget::new(&self.retry, role),
        };
        let decision = budget.record_failure();
        self.budget = Some(budget);
        self.updated_at = Utc::now();
        decision
    }

    /// Builds the wire metadata for `range` once its checksum is known.
    pub fn chunk_metadata(
        &self,
        range: &ChunkRange,
        checksum: String,
    ) -> Result<ChunkMetadata, TransferError> {
        let file_id = self.id.clone().ok_or(TransferError::NotStarted)?;
        Ok(ChunkMetadata {
            order: range.order,
            file_id,
            offset: range.offset,
            limit: range.limit,
            file_size: self.total_size,
            file_name: self.file_name.clone(),
            check_sum: checksum,
        })
    }

    /// The next range to send, if any remain.
    pub fn next_range(&self) -> Option<ChunkRange> {
        self.ranges.get(self.sent_count as usize).copied()
    }

    /// Ranges not yet acknowledged.
    pub fn remaining_ranges(&self) -> &[ChunkRange] {
        &self.ranges[self.sent_count as usize..]
    }

    /// Returns a snapshot of the session.
    pub fn progress(&self) -> UploadProgress {
        let sent_bytes = self.sent_bytes();
        let remaining = self.total_size - sent_bytes;
        let bytes_per_second = self.speed.bytes_per_second();
        UploadProgress {
            session_id: self.id.clone().unwrap_or_default(),
            state: self.state,
            file_name: self.file_name.clone(),
            sent_chunks: self.sent_count,
            total_chunks: self.total_ranges(),
            sent_bytes,
            total_bytes: self.total_size,
            bytes_per_second,
            eta_secs: match self.state {
                UploadState::Uploading => self.speed.eta(remaining).map(|d| d.as_secs_f64()),
                _ => None,
            },
            started_at: self
                .started_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            updated_at: self.updated_at.to_rfc3339(),
            error: self.error.clone(),
        }
    }

    /// Progress in percent of acknowledged chunks, clamped to `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        self.progress().percentage()
    }

    /// Session id; empty until the first start.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of acknowledged chunks.
    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    pub fn total_ranges(&self) -> u64 {
        self.ranges.len() as u64
    }

    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Bytes covered by acknowledged chunks.
    pub fn sent_bytes(&self) -> u64 {
        self.ranges[..self.sent_count as usize]
            .last()
            .map_or(0, |r| r.limit)
    }

    /// Last failure message; empty unless failed.
    pub fn error(&self) -> &str {
        &self.error
    }

    fn invalid(&self, action: &'static str) -> TransferError {
        TransferError::InvalidTransition {
            state: self.state,
            action,
        }
    }
}
