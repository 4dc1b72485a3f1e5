//! Upload controller: drives a session through the transmitter.
//!
//! The controller owns the session and is its only mutator. Callers on
//! other tasks use an [`UploadHandle`] to request a pause or a cancel and
//! to watch progress; both requests are honoured at the next suspension
//! point, never by interrupting a request in flight.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chunkup_protocol::{UploadProgress, UploadState};
use chunkup_transfer::{
    ByteSource, FileSource, RetryDecision, TransferError, UploadSession, validate_file_type,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::error::UploadError;
use crate::transmitter::{ChecksumFn, ChunkOutcome, ChunkTransmitter, sha256_checksum};
use crate::transport::ChunkTransport;
use crate::types::{RunOutcome, UploadEvent, UploaderConfig};

/// State shared between the controller and its handles.
struct Control {
    pause: AtomicBool,
    cancel: CancellationToken,
    progress: watch::Sender<UploadProgress>,
}

/// Cloneable remote for a running upload.
#[derive(Clone)]
pub struct UploadHandle {
    control: Arc<Control>,
}

impl UploadHandle {
    /// Requests a pause. The chunk in flight, if any, completes first.
    pub fn pause(&self) -> Result<(), UploadError> {
        let state = self.state();
        if state != UploadState::Uploading {
            return Err(TransferError::InvalidTransition {
                state,
                action: "pause",
            }
            .into());
        }
        self.control.pause.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Returns `true` while a pause request awaits the next boundary.
    pub fn pause_requested(&self) -> bool {
        self.control.pause.load(Ordering::SeqCst)
    }

    /// Requests cancellation. Also wakes a pending retry delay.
    pub fn cancel(&self) {
        self.control.cancel.cancel();
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.control.cancel.cancelled().await;
    }

    /// Latest published snapshot.
    pub fn progress(&self) -> UploadProgress {
        self.control.progress.borrow().clone()
    }

    pub fn state(&self) -> UploadState {
        self.control.progress.borrow().state
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.control.progress.subscribe()
    }
}

/// Uploads one file chunk by chunk.
pub struct UploadController {
    transport: Arc<dyn ChunkTransport>,
    source: Option<Arc<dyn ByteSource>>,
    session: UploadSession,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    control: Arc<Control>,
    checksum: ChecksumFn,
}

impl UploadController {
    /// Creates an idle controller for `source`.
    ///
    /// Fails if the source is empty or larger than
    /// [`UploaderConfig::max_file_size`], or if `file_name` is unusable or,
    /// with [`UploaderConfig::restrict_file_types`] set, not an image or PDF.
    pub fn new(
        transport: Arc<dyn ChunkTransport>,
        source: Arc<dyn ByteSource>,
        file_name: impl Into<String>,
        config: UploaderConfig,
    ) -> Result<Self, UploadError> {
        let file_name = file_name.into();
        if config.restrict_file_types {
            validate_file_type(&file_name)?;
        }

        let size = source.len();
        if config.max_file_size > 0 && size > config.max_file_size {
            return Err(TransferError::FileTooLarge {
                size,
                max: config.max_file_size,
            }
            .into());
        }

        let session = UploadSession::new(file_name, size, config.chunk_size, config.retry)?;
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let (progress, _) = watch::channel(session.progress());

        Ok(Self {
            transport,
            source: Some(source),
            session,
            events_tx,
            events_rx: Some(events_rx),
            control: Arc::new(Control {
                pause: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                progress,
            }),
            checksum: sha256_checksum,
        })
    }

    /// Opens the file at `path` and names the upload after it.
    pub async fn from_path(
        transport: Arc<dyn ChunkTransport>,
        path: &Path,
        config: UploaderConfig,
    ) -> Result<Self, UploadError> {
        let source = FileSource::open(path).await?;
        let file_name = source
            .file_name()
            .ok_or_else(|| TransferError::InvalidFileName(path.display().to_string()))?;
        Self::new(transport, Arc::new(source), file_name, config)
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns a handle for pausing, cancelling and watching this upload.
    pub fn handle(&self) -> UploadHandle {
        UploadHandle {
            control: Arc::clone(&self.control),
        }
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn progress(&self) -> UploadProgress {
        self.session.progress()
    }

    /// Starts the upload and runs until it completes, pauses, is
    /// cancelled or fails.
    pub async fn start(&mut self) -> Result<RunOutcome, UploadError> {
        self.run().await
    }

    /// Continues a paused upload from the first unacknowledged chunk.
    ///
    /// The session id is kept, so the service can append the remaining
    /// chunks to those it already stored.
    pub async fn resume(&mut self) -> Result<RunOutcome, UploadError> {
        self.run().await
    }

    /// Cancels the upload locally and drops the file association.
    pub fn cancel(&mut self) -> Result<(), UploadError> {
        self.control.cancel.cancel();
        self.session.cancel()?;
        self.source = None;
        self.state_changed();
        Ok(())
    }

    async fn run(&mut self) -> Result<RunOutcome, UploadError> {
        if self.control.cancel.is_cancelled() && !self.session.state().is_terminal() {
            return Ok(self.finish_cancel());
        }

        let previous = self.session.state();
        self.session.start()?;
        let source = self.source.clone().ok_or(UploadError::NoSource)?;
        self.control.pause.store(false, Ordering::SeqCst);
        if previous != UploadState::Uploading {
            self.state_changed();
        }

        let transport = Arc::clone(&self.transport);
        let transmitter = ChunkTransmitter::new(transport.as_ref(), source.as_ref())
            .with_checksum(self.checksum);
        let cancel = self.control.cancel.clone();

        while let Some(range) = self.session.next_range() {
            if cancel.is_cancelled() {
                return Ok(self.finish_cancel());
            }
            if self.control.pause.swap(false, Ordering::SeqCst) {
                self.session.pause()?;
                self.state_changed();
                return Ok(RunOutcome::Paused);
            }

            let sent = transmitter.send(&self.session, &range, &cancel).await;
            let outcome = match sent {
                Ok(outcome) => outcome,
                Err(UploadError::Cancelled) => return Ok(self.finish_cancel()),
                Err(e) => return Err(self.abort(e)),
            };

            match outcome {
                ChunkOutcome::Accepted => {
                    let state = match self.session.record_accepted(range.order) {
                        Ok(state) => state,
                        Err(e) => return Err(self.abort(e.into())),
                    };
                    let progress = self.session.progress();
                    self.emit(UploadEvent::ChunkAccepted {
                        order: range.order,
                        sent: progress.sent_chunks,
                        total: progress.total_chunks,
                        progress: progress.percentage(),
                    });
                    self.control.progress.send_replace(progress);

                    if state == UploadState::Completed {
                        self.state_changed();
                        self.emit(UploadEvent::Completed {
                            session_id: self.session.id().to_string(),
                        });
                        return Ok(RunOutcome::Completed);
                    }
                }
                ChunkOutcome::Unauthorized => return Err(self.abort(UploadError::Unauthorized)),
                ChunkOutcome::Rejected { .. } | ChunkOutcome::TransportFailure { .. } => {
                    match self.session.record_retryable_failure(&range) {
                        RetryDecision::Retry { attempt } => {
                            let delay = self.session.retry_policy().delay_for_attempt(attempt);
                            warn!(
                                session = %self.session.id(),
                                order = range.order,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                reason = outcome.reason(),
                                "retrying chunk"
                            );
                            self.emit(UploadEvent::Retrying {
                                order: range.order,
                                attempt,
                                delay,
                                reason: outcome.reason().to_string(),
                            });
                            if !delay.is_zero() {
                                tokio::select! {
                                    _ = cancel.cancelled() => return Ok(self.finish_cancel()),
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            }
                        }
                        RetryDecision::Exhausted { failures } => {
                            return Err(self.abort(UploadError::BudgetExhausted {
                                order: range.order,
                                failures,
                                last: outcome.reason().to_string(),
                            }));
                        }
                    }
                }
            }
        }

        // Only reachable when a resumed session had nothing left to send.
        Ok(RunOutcome::Completed)
    }

    fn finish_cancel(&mut self) -> RunOutcome {
        if let Err(e) = self.session.cancel() {
            trace!(error = %e, "session already terminal");
        }
        self.source = None;
        self.state_changed();
        RunOutcome::Cancelled
    }

    /// Marks the session failed and hands the error back.
    fn abort(&mut self, err: UploadError) -> UploadError {
        let message = err.to_string();
        if let Err(e) = self.session.fail(&message) {
            trace!(error = %e, "session not failable");
        }
        error!(session = %self.session.id(), error = %message, "upload failed");
        self.emit(UploadEvent::Failed {
            session_id: self.session.id().to_string(),
            error: message,
        });
        self.control.progress.send_replace(self.session.progress());
        err
    }

    fn state_changed(&self) {
        let state = self.session.state();
        info!(session = %self.session.id(), %state, "upload state changed");
        self.emit(UploadEvent::StateChanged {
            session_id: self.session.id().to_string(),
            state,
        });
        self.control.progress.send_replace(self.session.progress());
    }

    fn emit(&self, event: UploadEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events_tx.try_send(event) {
            trace!(?event, "event channel full, dropping event");
        }
    }
}
