//! Integration tests for the change applier and startup controller.

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use synctree_engine::{
    ApplyError, ChangeApplier, ManualTaskScheduler, PolicySource, RecordingErrorSink,
    RecordingObserver, StartupConfig, StartupController, SyncChangeObserver, TaskScheduler,
    TokenService, TokioTaskScheduler, UnrecoverableErrorSink,
};
use synctree_model::{
    ChangeRecord, ChangeType, ModelType, NodeId, Specifics, SyncChange, SyncData,
};
use synctree_store::TreeStore;

struct SignedInPolicy {
    setup_completed: bool,
}

impl PolicySource for SignedInPolicy {
    fn is_managed(&self) -> bool {
        false
    }
    fn is_start_suppressed(&self) -> bool {
        false
    }
    fn setup_completed(&self) -> bool {
        self.setup_completed
    }
    fn authenticated_account(&self) -> Option<String> {
        Some("user@example.com".to_owned())
    }
}

struct AlwaysAvailableTokens;

impl TokenService for AlwaysAvailableTokens {
    fn refresh_token_available(&self, _account_id: &str) -> bool {
        true
    }
}

fn controller_with(
    scheduler: Arc<dyn TaskScheduler>,
    config: StartupConfig,
) -> (StartupController, Arc<AtomicUsize>) {
    let starts = Arc::new(AtomicUsize::new(0));
    let starts_in_callback = Arc::clone(&starts);
    let controller = StartupController::new(
        config,
        Arc::new(SignedInPolicy { setup_completed: true }),
        Arc::new(AlwaysAvailableTokens),
        scheduler,
        Arc::new(move || {
            starts_in_callback.fetch_add(1, Ordering::SeqCst);
        }),
    );
    (controller, starts)
}

struct ApplierHarness {
    store: Arc<TreeStore>,
    observer: Arc<RecordingObserver>,
    errors: Arc<RecordingErrorSink>,
    applier: ChangeApplier,
}

fn applier_harness(provision: &[ModelType]) -> ApplierHarness {
    let store = Arc::new(TreeStore::new());
    {
        let mut txn = store.write();
        for model_type in provision {
            txn.provision_root(*model_type);
        }
    }
    let observer = Arc::new(RecordingObserver::new());
    let errors = Arc::new(RecordingErrorSink::new());
    let mut applier = ChangeApplier::new(
        Arc::clone(&store),
        Arc::downgrade(&observer) as Weak<dyn SyncChangeObserver>,
        Arc::clone(&errors) as Arc<dyn UnrecoverableErrorSink>,
    );
    applier.start();
    ApplierHarness { store, observer, errors, applier }
}

fn add_change(model_type: ModelType, tag: &str, payload: &[u8]) -> SyncChange {
    SyncChange::new(
        ChangeType::Add,
        SyncData::local(model_type, tag, tag, Specifics::plaintext(payload.to_vec())),
    )
}

#[test]
fn startup_gates_applier_then_changes_flow_end_to_end() {
    // The controller decides when the backend comes up; only then does
    // the applier run. Model the backend as the applier's start().
    let scheduler = Arc::new(ManualTaskScheduler::new());
    let (controller, starts) =
        controller_with(Arc::clone(&scheduler) as Arc<dyn TaskScheduler>, StartupConfig::default());

    // Completed setup with no explicit request: deferred.
    assert!(!controller.try_start());
    assert_eq!(controller.backend_state_string(), "Deferred");
    assert_eq!(starts.load(Ordering::SeqCst), 0);

    // Fallback fires, backend starts exactly once.
    assert!(scheduler.fire_next());
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert!(controller.backend_started());

    // Backend up: local changes commit into the store and read back.
    let mut h = applier_harness(&[ModelType::Bookmarks]);
    h.applier
        .process_sync_changes(&[
            add_change(ModelType::Bookmarks, "a", b"pa"),
            add_change(ModelType::Bookmarks, "b", b"pb"),
        ])
        .unwrap();

    let data = h.applier.get_sync_data_for_type(ModelType::Bookmarks).unwrap();
    assert_eq!(data.len(), 2);
    assert!(h.errors.is_empty());

    // Remote direction: update A, delete B, delivered in order.
    let (id_a, id_b) = (data[0].remote_id().unwrap(), data[1].remote_id().unwrap());
    {
        let mut txn = h.store.write();
        txn.set_specifics(id_a, Specifics::plaintext(b"p2".to_vec())).unwrap();
        txn.remove(id_b).unwrap();
    }
    {
        let txn = h.store.read();
        h.applier
            .apply_changes_from_sync_model(
                &txn,
                &[
                    ChangeRecord::update(id_a, ModelType::Bookmarks, Specifics::default()),
                    ChangeRecord::delete(id_b, ModelType::Bookmarks),
                ],
            )
            .unwrap();
    }
    h.applier.commit_changes_from_sync_model().unwrap();

    let received = h.observer.changes();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].change_type, ChangeType::Update);
    assert_eq!(received[0].data.remote_id(), Some(id_a));
    assert_eq!(received[0].data.specifics(), &Specifics::plaintext(b"p2".to_vec()));
    assert_eq!(received[1].change_type, ChangeType::Delete);
    assert_eq!(received[1].data.remote_id(), Some(id_b));
}

#[test]
fn add_without_provisioned_root_is_a_provisioning_failure() {
    let h = applier_harness(&[]);
    let err = h
        .applier
        .process_sync_changes(&[add_change(ModelType::Preferences, "p", b"v")])
        .unwrap_err();
    assert_eq!(err, ApplyError::Provisioning { model_type: ModelType::Preferences });
    assert!(h.store.read().node_id_for_tag(ModelType::Preferences, "p").is_none());
}

#[test]
fn second_add_with_same_tag_fails_without_touching_first() {
    let h = applier_harness(&[ModelType::Autofill]);
    h.applier.process_sync_changes(&[add_change(ModelType::Autofill, "t1", b"v1")]).unwrap();
    let err = h
        .applier
        .process_sync_changes(&[add_change(ModelType::Autofill, "t1", b"v2")])
        .unwrap_err();
    assert!(matches!(err, ApplyError::Creation { .. }));

    let data = h.applier.get_sync_data_for_type(ModelType::Autofill).unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].specifics(), &Specifics::plaintext(b"v1".to_vec()));
}

#[test]
fn snapshot_read_returns_children_in_sibling_order() {
    let h = applier_harness(&[ModelType::Preferences]);
    let tags = ["n1", "n2", "n3", "n4"];
    for tag in tags {
        h.applier
            .process_sync_changes(&[add_change(ModelType::Preferences, tag, tag.as_bytes())])
            .unwrap();
    }
    // Overwrite one child so "last written" is what must read back.
    let update = SyncChange::new(
        ChangeType::Update,
        SyncData::local(ModelType::Preferences, "n2", "n2", Specifics::plaintext(b"v2".to_vec())),
    );
    h.applier.process_sync_changes(&[update]).unwrap();

    let data = h.applier.get_sync_data_for_type(ModelType::Preferences).unwrap();
    assert_eq!(data.len(), tags.len());
    let payloads: Vec<&[u8]> = data.iter().map(|d| d.specifics().data.as_slice()).collect();
    let expected: Vec<&[u8]> = vec![b"n1", b"v2", b"n3", b"n4"];
    assert_eq!(payloads, expected);
}

#[tokio::test]
async fn fallback_timer_forces_deferred_start_exactly_once() {
    let config = StartupConfig::default().with_fallback_timeout(Duration::from_millis(50));
    let (controller, starts) = controller_with(Arc::new(TokioTaskScheduler), config);

    assert!(!controller.try_start());
    assert_eq!(starts.load(Ordering::SeqCst), 0);
    assert_eq!(controller.backend_state_string(), "Deferred");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(controller.backend_state_string(), "Started");

    // Further triggers stay idempotent.
    controller.on_data_type_requests_sync_startup(ModelType::Bookmarks);
    assert!(controller.try_start());
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

proptest! {
    // Batches of tag-unique adds always commit fully; every payload
    // written reads back unchanged through the snapshot read.
    #[test]
    fn conflict_free_add_batches_round_trip(
        tags in prop::collection::hash_set("[a-z]{1,8}", 1..8),
    ) {
        let h = applier_harness(&[ModelType::Bookmarks]);
        let batch: Vec<SyncChange> = tags
            .iter()
            .map(|tag| add_change(ModelType::Bookmarks, tag, tag.as_bytes()))
            .collect();
        h.applier.process_sync_changes(&batch).unwrap();
        prop_assert!(h.errors.is_empty());

        let data = h.applier.get_sync_data_for_type(ModelType::Bookmarks).unwrap();
        prop_assert_eq!(data.len(), tags.len());

        let txn = h.store.read();
        for tag in &tags {
            let id = txn.node_id_for_tag(ModelType::Bookmarks, tag);
            prop_assert!(id.is_some());
            let specifics = txn.specifics(id.unwrap()).unwrap();
            prop_assert_eq!(specifics.data, tag.as_bytes().to_vec());
        }
    }
}

#[test]
fn delete_by_remote_id_round_trip() {
    let h = applier_harness(&[ModelType::Passwords]);
    h.applier.process_sync_changes(&[add_change(ModelType::Passwords, "pw", b"v")]).unwrap();
    let id = h.store.read().node_id_for_tag(ModelType::Passwords, "pw").unwrap();

    let delete = SyncChange::new(
        ChangeType::Delete,
        SyncData::remote(ModelType::Passwords, id, Specifics::default()),
    );
    h.applier.process_sync_changes(&[delete]).unwrap();
    assert!(!h.applier.sync_model_has_user_created_nodes(ModelType::Passwords).unwrap());

    // Deleting the same node again is a distinct, reported failure.
    let delete_again = SyncChange::new(
        ChangeType::Delete,
        SyncData::remote(ModelType::Passwords, id, Specifics::default()),
    );
    let err = h.applier.process_sync_changes(&[delete_again]).unwrap_err();
    assert!(err.to_string().contains("already deleted"));
    assert_eq!(h.errors.reports().len(), 1);
}

#[test]
fn delete_of_unknown_remote_id_reports_not_found() {
    let h = applier_harness(&[ModelType::Passwords]);
    let delete = SyncChange::new(
        ChangeType::Delete,
        SyncData::remote(ModelType::Passwords, NodeId::new(4242), Specifics::default()),
    );
    let err = h.applier.process_sync_changes(&[delete]).unwrap_err();
    assert!(matches!(err, ApplyError::Lookup { .. }));
    assert_eq!(h.errors.reports().len(), 1);
}
