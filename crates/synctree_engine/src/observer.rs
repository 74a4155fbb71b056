//! Collaborator traits for the change applier, with recording fakes.

use crate::error::{ApplyError, ApplyResult};
use parking_lot::Mutex;
use synctree_model::{ModelType, SyncChange};

/// The local mutation consumer.
///
/// Remote changes flushed by the applier land here. Implementations
/// apply them to the local model and return an error when the batch
/// cannot be consumed; the applier forwards that error to the
/// unrecoverable-error sink.
pub trait SyncChangeObserver: Send + Sync {
    /// Applies an ordered batch of changes to the local model.
    fn process_sync_changes(&self, changes: Vec<SyncChange>) -> ApplyResult<()>;
}

/// Fire-and-forget sink for per-type unrecoverable errors.
///
/// The applier never expects a return value or a retry signal from the
/// sink; the host typically disables sync for the reported type.
pub trait UnrecoverableErrorSink: Send + Sync {
    /// Reports an unrecoverable error for one model type.
    fn report(&self, model_type: ModelType, message: &str);
}

/// An observer that records every batch it receives. Intended for
/// tests.
#[derive(Default)]
pub struct RecordingObserver {
    batches: Mutex<Vec<Vec<SyncChange>>>,
    failure: Mutex<Option<ApplyError>>,
}

impl RecordingObserver {
    /// Creates an observer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `process_sync_changes` call return `error`.
    pub fn fail_with(&self, error: ApplyError) {
        *self.failure.lock() = Some(error);
    }

    /// All batches received so far.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<SyncChange>> {
        self.batches.lock().clone()
    }

    /// All changes received so far, flattened in arrival order.
    #[must_use]
    pub fn changes(&self) -> Vec<SyncChange> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

impl SyncChangeObserver for RecordingObserver {
    fn process_sync_changes(&self, changes: Vec<SyncChange>) -> ApplyResult<()> {
        if let Some(error) = self.failure.lock().take() {
            return Err(error);
        }
        self.batches.lock().push(changes);
        Ok(())
    }
}

/// An error sink that records every report. Intended for tests.
#[derive(Default)]
pub struct RecordingErrorSink {
    reports: Mutex<Vec<(ModelType, String)>>,
}

impl RecordingErrorSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<(ModelType, String)> {
        self.reports.lock().clone()
    }

    /// True if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl UnrecoverableErrorSink for RecordingErrorSink {
    fn report(&self, model_type: ModelType, message: &str) {
        tracing::error!(%model_type, message, "unrecoverable sync error");
        self.reports.lock().push((model_type, message.to_owned()));
    }
}
