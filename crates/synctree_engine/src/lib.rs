//! # Synctree Engine
//!
//! Change application and startup coordination for synctree.
//!
//! This crate provides:
//! - `ChangeApplier`: bidirectional change application between the
//!   replicated tree store and a local observer
//! - `StartupController`: deferred/triggered scheduling of backend
//!   initialization
//! - `FailedTypesTracker`: per-type record of unrecoverable errors
//! - Collaborator traits (observer, error sink, policy, tokens, task
//!   scheduler) with recording fakes for tests
//!
//! ## Architecture
//!
//! The controller gates when the backend, and with it the applier,
//! becomes active. Once active, the store's notification layer drives
//! the remote direction (`apply_changes_from_sync_model` then
//! `commit_changes_from_sync_model`) and the local change source
//! drives the other (`process_sync_changes`).
//!
//! ## Key invariants
//!
//! - The backend-start callback fires at most once per startup-state
//!   lifetime; `reset()` begins a new lifetime and invalidates any
//!   armed fallback timer.
//! - Errors are per model type and non-retriable: each is reported
//!   once through the error sink and returned; the caller disables the
//!   type rather than retrying.
//! - Batch processing stops at the first error. Earlier tree writes in
//!   the batch stay committed; batches must be safe to retry from
//!   scratch.
//! - All entry points run on one coordination thread.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod error;
mod failed_types;
mod observer;
mod startup;
mod thread_check;

pub use applier::ChangeApplier;
pub use error::{ApplyError, ApplyResult};
pub use failed_types::{FailedTypesTracker, FailureKind};
pub use observer::{
    RecordingErrorSink, RecordingObserver, SyncChangeObserver, UnrecoverableErrorSink,
};
pub use startup::{
    ManualTaskScheduler, PolicySource, StartMode, StartupConfig, StartupController, TaskScheduler,
    TokenService, TokioTaskScheduler,
};
