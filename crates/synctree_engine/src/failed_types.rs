//! Tracking of data types disabled by unrecoverable errors.

use crate::error::ApplyError;
use synctree_model::ModelTypeSet;

/// When a type's failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The type failed while the backend was starting.
    Startup,
    /// The type failed during normal operation.
    Runtime,
}

/// Keeps the per-type errors that have taken data types out of sync.
///
/// The applier's errors are per-type and non-retriable; the host feeds
/// them here and stops routing changes for the failed types. Choosing
/// a new set of types to sync clears the record so the types get one
/// more attempt.
#[derive(Debug, Default)]
pub struct FailedTypesTracker {
    startup_errors: Vec<ApplyError>,
    runtime_errors: Vec<ApplyError>,
}

impl FailedTypesTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a batch of errors. Returns true if any were recorded.
    pub fn update(
        &mut self,
        errors: impl IntoIterator<Item = ApplyError>,
        kind: FailureKind,
    ) -> bool {
        let bucket = match kind {
            FailureKind::Startup => &mut self.startup_errors,
            FailureKind::Runtime => &mut self.runtime_errors,
        };
        let before = bucket.len();
        bucket.extend(errors);
        bucket.len() > before
    }

    /// Clears all recorded failures so the types are retried once the
    /// user has chosen a new set of types to sync.
    pub fn on_user_chose_types(&mut self) {
        self.startup_errors.clear();
        self.runtime_errors.clear();
    }

    /// The set of types currently failing.
    #[must_use]
    pub fn failed_types(&self) -> ModelTypeSet {
        self.errors().map(ApplyError::model_type).collect()
    }

    /// True if any type is currently failing.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        !self.startup_errors.is_empty() || !self.runtime_errors.is_empty()
    }

    /// One line per failure, for diagnostics pages.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|error| format!("{}: {}", error.model_type(), error))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn errors(&self) -> impl Iterator<Item = &ApplyError> {
        self.startup_errors.iter().chain(self.runtime_errors.iter())
    }
}
