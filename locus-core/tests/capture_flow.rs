use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};

use locus_core::error::{CaptureError, SourceError, StoreError};
use locus_core::model::{ChangeSet, ContextSnapshot};
use locus_core::services::{ContextTracker, MemoryReceiptStore, ReceiptGenerator, ReceiptIdScheme, ReceiptStore};
use locus_core::sources::{Clock, FixedClock, NativeRefTagSource, RefTagSource, SnapshotSource};
use locus_core::utils::digest::sha256_prefix;

// 2024-05-06T07:08:09.123Z
const T0: i64 = 1_714_979_289_123;

struct FixedTag(&'static str);

impl RefTagSource for FixedTag {
    fn generate(&self, _action: &str, _note: &str) -> Result<String, SourceError> {
        Ok(self.0.to_string())
    }
}

struct BrokenTags;

impl RefTagSource for BrokenTags {
    fn generate(&self, _action: &str, _note: &str) -> Result<String, SourceError> {
        Err(SourceError::Exit {
            code: Some(1),
            stderr: "script missing".into(),
        })
    }
}

struct StaticSnapshot(ContextSnapshot);

impl SnapshotSource for StaticSnapshot {
    fn snapshot(&self) -> ContextSnapshot {
        self.0.clone()
    }
}

struct FullDisk;

impl ReceiptStore for FullDisk {
    fn write(&self, _ref_tag: &str, _document: &Value) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("/receipts"),
            source: io::Error::other("no space left on device"),
        })
    }

    fn read(&self, ref_tag: &str) -> Result<Value, StoreError> {
        Err(StoreError::NotFound(ref_tag.to_string()))
    }

    fn list(&self) -> Result<Vec<Value>, StoreError> {
        Ok(Vec::new())
    }
}

fn tracker(
    tags: impl RefTagSource + 'static,
    before: ContextSnapshot,
    store: Arc<dyn ReceiptStore>,
    at_ms: i64,
) -> ContextTracker {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_millis(at_ms));
    let generator = ReceiptGenerator::new(store, clock.clone()).with_host("test-host");
    ContextTracker::new(
        Box::new(tags),
        Box::new(StaticSnapshot(before)),
        generator,
        clock,
    )
}

#[test]
fn capture_merges_hashes_and_persists() {
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(
        FixedTag("LOCUS-NOTIFY-1"),
        ContextSnapshot::new().with("a", 1),
        store.clone(),
        T0,
    );

    let event = t
        .capture("notify", "test", ChangeSet::new().with("foo", "bar"))
        .expect("capture");

    assert_eq!(event.ref_tag, "LOCUS-NOTIFY-1");
    assert_eq!(event.timestamp, T0);
    assert_eq!(event.trigger, "test");
    assert_eq!(event.receipt_id, "CTX-2024-05-06T0708");
    assert_eq!(event.context_before, ContextSnapshot::new().with("a", 1));
    assert_eq!(
        event.context_after,
        ContextSnapshot::new().with("a", 1).with("foo", "bar")
    );
    assert_eq!(event.hash, sha256_prefix(r#"{"a":1,"foo":"bar"}"#, 8));
    assert!(!event.has_fallback_ref_tag());

    // exactly one receipt, keyed by the ref tag
    assert_eq!(store.count().unwrap(), 1);
    let receipt = store.read_receipt("LOCUS-NOTIFY-1").expect("stored receipt");
    assert_eq!(receipt.receipt_id, event.receipt_id);
    assert_eq!(receipt.validation.checksum, event.hash);
    assert_eq!(receipt.generation_context.prior_state, event.context_before);
    assert_eq!(receipt.generation_context.current_state, event.context_after);
    assert_eq!(receipt.generation_context.delta_summary.fields_changed, vec!["foo"]);
}

#[test]
fn after_is_before_overlaid_with_changes() {
    let before = ContextSnapshot::new()
        .with("keep", "me")
        .with("swap", 1)
        .with("agents", json!({"alpha": "idle"}));
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(FixedTag("LOCUS-DASH-1"), before.clone(), store, T0);

    let changes = ChangeSet::new()
        .with("swap", 2)
        .with("agents", json!({"beta": "busy"}))
        .with("added", json!([1, 2]));
    let event = t.capture("dash", "cron", changes.clone()).unwrap();

    for (k, v) in changes.iter() {
        assert_eq!(event.context_after.get(k), Some(v), "changed key {k}");
    }
    assert_eq!(event.context_after.get("keep"), Some(&json!("me")));
    assert_eq!(event.context_after.len(), 4);
    assert_eq!(event.context_before, before);
    assert_eq!(event.hash, event.context_after.content_hash());
}

#[test]
fn capture_only_leaves_state_unchanged() {
    let before = ContextSnapshot::new().with("a", 1).with("b", "two");
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(FixedTag("LOCUS-RESEARCH-1"), before.clone(), store.clone(), T0);

    let event = t.capture_only("research", "manual").unwrap();
    assert!(event.changes.is_empty());
    assert_eq!(event.context_after, before);
    assert_eq!(event.hash, before.content_hash());

    let receipt = store.read_receipt("LOCUS-RESEARCH-1").unwrap();
    assert!(receipt.generation_context.delta_summary.fields_changed.is_empty());
    assert_eq!(receipt.generation_context.delta_summary.new_capabilities, json!([]));
    assert_eq!(receipt.generation_context.delta_summary.risk_adjustments, json!("none"));
}

#[test]
fn ref_tag_failure_falls_back_to_marked_tag() {
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(BrokenTags, ContextSnapshot::new(), store.clone(), T0);

    let event = t.capture("deploy", "cli", ChangeSet::new()).expect("capture still succeeds");
    assert_eq!(event.ref_tag, format!("LOCUS-DEPLOY-{T0}-ERROR"));
    assert!(event.ref_tag.contains("ERROR"));
    assert!(event.ref_tag.contains(&T0.to_string()));
    assert!(event.has_fallback_ref_tag());
    assert!(store.read(&event.ref_tag).is_ok());
}

#[test]
fn persistence_failure_is_returned() {
    let t = tracker(
        FixedTag("LOCUS-NOTIFY-9"),
        ContextSnapshot::new(),
        Arc::new(FullDisk),
        T0,
    );
    let err = t
        .capture("notify", "test", ChangeSet::new().with("x", 1))
        .expect_err("store failure must surface");
    assert!(matches!(err, CaptureError::Persistence(StoreError::Io { .. })));
}

#[test]
fn empty_action_or_trigger_is_rejected() {
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(FixedTag("LOCUS-X-1"), ContextSnapshot::new(), store.clone(), T0);

    assert!(matches!(
        t.capture("", "test", ChangeSet::new()),
        Err(CaptureError::InvalidInput("action"))
    ));
    assert!(matches!(
        t.capture("notify", "  ", ChangeSet::new()),
        Err(CaptureError::InvalidInput("trigger"))
    ));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn same_millisecond_captures_share_receipt_id_and_overwrite() {
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(FixedTag("LOCUS-NOTIFY-SAME"), ContextSnapshot::new(), store.clone(), T0);

    let first = t.capture("notify", "a", ChangeSet::new().with("n", 1)).unwrap();
    let second = t.capture("notify", "b", ChangeSet::new().with("n", 2)).unwrap();

    assert_eq!(first.timestamp, second.timestamp);
    assert_eq!(first.receipt_id, second.receipt_id);
    assert_ne!(first.hash, second.hash);

    // one file, holding the later event
    assert_eq!(store.count().unwrap(), 1);
    let stored = store.read_receipt("LOCUS-NOTIFY-SAME").unwrap();
    assert_eq!(stored.generation_context.trigger, "b");
    assert_eq!(stored.validation.checksum, second.hash);
}

#[test]
fn sequenced_receipt_ids_do_not_collide() {
    let store = Arc::new(MemoryReceiptStore::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_millis(T0));
    let generator = ReceiptGenerator::new(store.clone(), clock.clone());
    let t = ContextTracker::new(
        Box::new(NativeRefTagSource::new(clock.clone())),
        Box::new(StaticSnapshot(ContextSnapshot::new())),
        generator,
        clock,
    )
    .with_receipt_ids(ReceiptIdScheme::Sequenced);

    let a = t.capture("notify", "test", ChangeSet::new()).unwrap();
    let b = t.capture("notify", "test", ChangeSet::new()).unwrap();

    assert_ne!(a.receipt_id, b.receipt_id);
    assert!(a.receipt_id.starts_with("CTX-2024-05-06T0708-"));
    // native tags carry a random suffix, so both receipts survive
    assert_ne!(a.ref_tag, b.ref_tag);
    assert!(a.ref_tag.starts_with("LOCUS-NOTIFY-20240506070809-"));
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn degraded_snapshot_is_recorded_not_fatal() {
    let before = ContextSnapshot::new()
        .with(ContextSnapshot::GIT_CHANGES, 0)
        .with(ContextSnapshot::ERROR, "git status failed: not a repository");
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(FixedTag("LOCUS-NOTIFY-D"), before, store.clone(), T0);

    let event = t.capture("notify", "test", ChangeSet::new().with("k", "v")).unwrap();
    assert!(event.context_before.is_degraded());
    assert!(event.context_after.is_degraded());

    let receipt = store.read_receipt("LOCUS-NOTIFY-D").unwrap();
    assert_eq!(
        receipt.generation_context.prior_state.error(),
        Some("git status failed: not a repository")
    );
}

#[test]
fn fields_changed_are_sorted() {
    let store = Arc::new(MemoryReceiptStore::new());
    let t = tracker(FixedTag("LOCUS-SORT-1"), ContextSnapshot::new(), store.clone(), T0);
    let changes = ChangeSet::new().with("zeta", 1).with("alpha", 2).with("mid", 3);
    t.capture("sort", "test", changes).unwrap();

    let receipt = store.read_receipt("LOCUS-SORT-1").unwrap();
    assert_eq!(
        receipt.generation_context.delta_summary.fields_changed,
        vec!["alpha", "mid", "zeta"]
    );
}
