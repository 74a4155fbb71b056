//! Bidirectional change application between the replicated tree store
//! and the local model.

use crate::error::{ApplyError, ApplyResult};
use crate::observer::{SyncChangeObserver, UnrecoverableErrorSink};
use crate::thread_check::ThreadChecker;
use std::sync::{Arc, Weak};
use synctree_model::{ChangeAction, ChangeRecord, ChangeType, ModelType, SyncChange, SyncData};
use synctree_store::{LookupError, ReadTransaction, TreeStore, WriteTransaction};

/// Translates between the replicated tree store and the local model.
///
/// Remote direction: the store's notification layer calls
/// [`apply_changes_from_sync_model`](ChangeApplier::apply_changes_from_sync_model)
/// with a batch of change records, then
/// [`commit_changes_from_sync_model`](ChangeApplier::commit_changes_from_sync_model)
/// to flush the synthesized changes to the observer.
///
/// Local direction: the local change source calls
/// [`process_sync_changes`](ChangeApplier::process_sync_changes) to
/// commit its mutations into the store.
///
/// Batches fail on the first unrecoverable condition. Tree writes made
/// by earlier changes in the same batch are not rolled back; callers
/// must treat any returned error as "some prefix of the batch
/// committed" and retry the batch from scratch if needed.
pub struct ChangeApplier {
    store: Arc<TreeStore>,
    observer: Weak<dyn SyncChangeObserver>,
    errors: Arc<dyn UnrecoverableErrorSink>,
    pending: Vec<SyncChange>,
    running: bool,
    thread_checker: ThreadChecker,
}

impl ChangeApplier {
    /// Creates an applier. It starts stopped; call
    /// [`start`](ChangeApplier::start) once the backend is up.
    ///
    /// The observer is held weakly so its teardown is observable rather
    /// than silently keeping it alive.
    pub fn new(
        store: Arc<TreeStore>,
        observer: Weak<dyn SyncChangeObserver>,
        errors: Arc<dyn UnrecoverableErrorSink>,
    ) -> Self {
        Self {
            store,
            observer,
            errors,
            pending: Vec::new(),
            running: false,
            thread_checker: ThreadChecker::new(),
        }
    }

    /// Marks the applier as running. Remote changes are only flushed
    /// while running.
    pub fn start(&mut self) {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        self.running = true;
    }

    /// Marks the applier as stopped.
    pub fn stop(&mut self) {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        self.running = false;
    }

    /// True if the applier is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Buffers a batch of remote change records for later commit.
    ///
    /// Deletes are synthesized from the record alone: the node may no
    /// longer be readable. Adds and updates read the node's current
    /// payload within `txn`. On the first failed lookup the error is
    /// reported, the buffer is discarded, and the rest of the batch is
    /// not processed.
    pub fn apply_changes_from_sync_model(
        &mut self,
        txn: &ReadTransaction<'_>,
        changes: &[ChangeRecord],
    ) -> ApplyResult<()> {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        debug_assert!(self.running);
        debug_assert!(self.pending.is_empty());
        for record in changes {
            match record.action {
                ChangeAction::Delete => {
                    let specifics = record.specifics.clone().unwrap_or_default();
                    self.pending.push(SyncChange::new(
                        ChangeType::Delete,
                        SyncData::remote(record.model_type, record.id, specifics),
                    ));
                }
                ChangeAction::Add | ChangeAction::Update => {
                    let change_type = if record.action == ChangeAction::Add {
                        ChangeType::Add
                    } else {
                        ChangeType::Update
                    };
                    match txn.specifics(record.id) {
                        Ok(specifics) => self.pending.push(SyncChange::new(
                            change_type,
                            SyncData::remote(record.model_type, record.id, specifics),
                        )),
                        Err(source) => {
                            self.pending.clear();
                            let context = format!(
                                "failed to look up data for received change with id {}",
                                record.id
                            );
                            return Err(self.report(ApplyError::lookup(
                                record.model_type,
                                context,
                                source,
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Flushes buffered remote changes to the observer, in original
    /// order, then clears the buffer. No-op when the buffer is empty
    /// or the applier is not running.
    pub fn commit_changes_from_sync_model(&mut self) -> ApplyResult<()> {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        if !self.running || self.pending.is_empty() {
            return Ok(());
        }
        let Some(observer) = self.observer.upgrade() else {
            let model_type = self.pending[0].model_type();
            return Err(self.report(ApplyError::ObserverUnavailable { model_type }));
        };
        let changes = std::mem::take(&mut self.pending);
        if let Err(error) = observer.process_sync_changes(changes) {
            return Err(self.report(error));
        }
        Ok(())
    }

    /// Commits an ordered batch of local changes into the store.
    ///
    /// One write transaction covers the whole batch. Processing stops
    /// at the first error; the transaction still publishes the prefix
    /// written before the failure.
    pub fn process_sync_changes(&self, changes: &[SyncChange]) -> ApplyResult<()> {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        let mut txn = self.store.write();
        for change in changes {
            let model_type = change.model_type();
            if model_type == ModelType::Unspecified {
                return Err(self.report(ApplyError::invariant(
                    model_type,
                    "received change with unset model type",
                )));
            }
            match change.change_type {
                ChangeType::Delete => self.attempt_delete(&mut txn, change)?,
                ChangeType::Add => self.attempt_add(&mut txn, change)?,
                ChangeType::Update => self.attempt_update(&mut txn, change)?,
            }
        }
        Ok(())
    }

    fn attempt_delete(
        &self,
        txn: &mut WriteTransaction<'_>,
        change: &SyncChange,
    ) -> ApplyResult<()> {
        let model_type = change.model_type();
        let id = if change.data.is_local() {
            let tag = change.data.tag();
            if tag.is_empty() {
                return Err(self.report(ApplyError::invariant(
                    model_type,
                    "local delete with empty tag",
                )));
            }
            txn.find_by_client_tag(model_type, tag).map_err(|source| {
                self.report(ApplyError::lookup(
                    model_type,
                    "failed to delete node with local data",
                    source,
                ))
            })?
        } else {
            // Remote-origin data always carries the node ID.
            let remote_id = match change.data.remote_id() {
                Some(id) => id,
                None => {
                    return Err(self.report(ApplyError::invariant(
                        model_type,
                        "remote delete without a node id",
                    )))
                }
            };
            txn.find_by_id(remote_id).map_err(|source| {
                self.report(ApplyError::lookup(
                    model_type,
                    "failed to delete node with remote data",
                    source,
                ))
            })?
        };
        txn.remove(id).map_err(|source| {
            self.report(ApplyError::lookup(model_type, "failed to remove node", source))
        })?;
        Ok(())
    }

    fn attempt_add(&self, txn: &mut WriteTransaction<'_>, change: &SyncChange) -> ApplyResult<()> {
        let model_type = change.model_type();
        let root = match txn.root(model_type) {
            Ok(root) => root,
            Err(_) => return Err(self.report(ApplyError::Provisioning { model_type })),
        };
        let id = txn
            .create_unique(model_type, root, change.data.tag(), None)
            .map_err(|source| self.report(ApplyError::Creation { model_type, source }))?;
        txn.set_title(id, change.data.title()).map_err(|source| {
            self.report(ApplyError::lookup(model_type, "failed to initialize created node", source))
        })?;
        txn.set_specifics(id, change.data.specifics().clone()).map_err(|source| {
            self.report(ApplyError::lookup(model_type, "failed to initialize created node", source))
        })?;
        Ok(())
    }

    fn attempt_update(
        &self,
        txn: &mut WriteTransaction<'_>,
        change: &SyncChange,
    ) -> ApplyResult<()> {
        let model_type = change.model_type();
        let tag = change.data.tag();
        let id = match txn.find_by_client_tag(model_type, tag) {
            Ok(id) => id,
            Err(LookupError::PreconditionFailed) => {
                return Err(self.report(ApplyError::lookup(
                    model_type,
                    "failed to load entry with empty tag",
                    LookupError::PreconditionFailed,
                )))
            }
            Err(LookupError::NotFound) => {
                return Err(self.report(ApplyError::lookup(
                    model_type,
                    "failed to load bad entry",
                    LookupError::NotFound,
                )))
            }
            Err(LookupError::Deleted) => {
                return Err(self.report(ApplyError::lookup(
                    model_type,
                    "failed to load deleted entry",
                    LookupError::Deleted,
                )))
            }
            Err(LookupError::Undecryptable) => {
                return Err(self.report(self.diagnose_undecryptable(txn, model_type, tag)))
            }
        };
        txn.set_title(id, change.data.title()).map_err(|source| {
            self.report(ApplyError::lookup(model_type, "failed to update node", source))
        })?;
        txn.set_specifics(id, change.data.specifics().clone()).map_err(|source| {
            self.report(ApplyError::lookup(model_type, "failed to update node", source))
        })?;
        Ok(())
    }

    /// Cross-checks the encrypted-type set against key availability to
    /// say *why* an encrypted entry could not be loaded. Purely
    /// diagnostic; none of the four cases is recoverable here.
    fn diagnose_undecryptable(
        &self,
        txn: &WriteTransaction<'_>,
        model_type: ModelType,
        tag: &str,
    ) -> ApplyError {
        let should_be_encrypted = txn.encrypted_types().contains(model_type);
        let can_decrypt = txn
            .node_id_for_tag(model_type, tag)
            .and_then(|id| txn.raw_specifics(id))
            .and_then(|specifics| specifics.encrypted)
            .map(|envelope| txn.cryptographer().can_decrypt(&envelope))
            .unwrap_or(false);
        let context = match (should_be_encrypted, can_decrypt) {
            (false, false) => {
                "failed to load encrypted entry, missing key and the type is not marked encrypted"
            }
            (true, false) => {
                "failed to load encrypted entry, missing key and the type is marked encrypted"
            }
            (true, true) => {
                "failed to load encrypted entry, key present and the type is marked encrypted (?!)"
            }
            (false, true) => {
                "failed to load encrypted entry, key present (?!) and the type is not marked encrypted"
            }
        };
        ApplyError::lookup(model_type, context, LookupError::Undecryptable)
    }

    /// Snapshot read of every child payload under the type's root, in
    /// sibling-chain order. Any error invalidates the whole read.
    pub fn get_sync_data_for_type(&self, model_type: ModelType) -> ApplyResult<Vec<SyncData>> {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        let txn = self.store.read();
        let root = txn.root(model_type).map_err(|_| ApplyError::Provisioning { model_type })?;
        let mut data = Vec::new();
        for child in txn.children(root) {
            let specifics = txn.specifics(child).map_err(|source| {
                ApplyError::lookup(model_type, "failed to fetch child node", source)
            })?;
            data.push(SyncData::remote(model_type, child, specifics));
        }
        Ok(data)
    }

    /// Cheap cardinality probe: true iff the type's root exists and
    /// has at least one child.
    pub fn sync_model_has_user_created_nodes(&self, model_type: ModelType) -> ApplyResult<bool> {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        debug_assert!(model_type != ModelType::Unspecified);
        let txn = self.store.read();
        let root = txn.root(model_type).map_err(|_| ApplyError::Provisioning { model_type })?;
        Ok(txn.has_children(root))
    }

    /// True if the type either requires no encryption or the
    /// cryptographer is ready.
    #[must_use]
    pub fn crypto_ready_if_necessary(&self, model_type: ModelType) -> bool {
        debug_assert!(self.thread_checker.calling_thread_is_valid());
        debug_assert!(model_type != ModelType::Unspecified);
        let txn = self.store.read();
        !txn.encrypted_types().contains(model_type) || txn.cryptographer().is_ready()
    }

    /// The store this applier writes into.
    #[must_use]
    pub fn store(&self) -> &Arc<TreeStore> {
        &self.store
    }

    fn report(&self, error: ApplyError) -> ApplyError {
        self.errors.report(error.model_type(), &error.to_string());
        error
    }
}
