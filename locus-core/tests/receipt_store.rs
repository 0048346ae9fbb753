use std::fs;

use serde_json::{Value, json};
use tempfile::tempdir;

use locus_core::error::StoreError;
use locus_core::services::{FileReceiptStore, MemoryReceiptStore, ReceiptStore};

fn doc(tag: &str, n: i64) -> Value {
    json!({ "ref_tag": tag, "receipt_id": format!("CTX-{n}"), "timestamp": n })
}

fn tags(list: &[Value]) -> Vec<&str> {
    list.iter()
        .map(|d| d["ref_tag"].as_str().unwrap_or_default())
        .collect()
}

#[test]
fn write_then_read_returns_the_same_document() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path().join("receipts")).unwrap();

    let d = doc("LOCUS-NOTIFY-1", 1);
    store.write("LOCUS-NOTIFY-1", &d).unwrap();
    assert_eq!(store.read("LOCUS-NOTIFY-1").unwrap(), d);

    let path = store.path_for("LOCUS-NOTIFY-1");
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("receipt_LOCUS-NOTIFY-1.json")
    );
    // pretty-printed on disk
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'));
}

#[test]
fn writes_overwrite_in_place() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path()).unwrap();
    store.write("LOCUS-A", &doc("LOCUS-A", 1)).unwrap();
    store.write("LOCUS-A", &doc("LOCUS-A", 2)).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.read("LOCUS-A").unwrap()["timestamp"], json!(2));
}

#[test]
fn list_is_sorted_by_file_name() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path()).unwrap();
    for (i, tag) in ["LOCUS-C", "LOCUS-A", "LOCUS-B"].iter().enumerate() {
        store.write(tag, &doc(tag, i as i64)).unwrap();
    }
    let all = store.list().unwrap();
    assert_eq!(tags(&all), vec!["LOCUS-A", "LOCUS-B", "LOCUS-C"]);
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn missing_receipt_is_not_found() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path()).unwrap();
    match store.read("LOCUS-NOPE") {
        Err(StoreError::NotFound(tag)) => assert_eq!(tag, "LOCUS-NOPE"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn path_like_ref_tags_are_refused() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path().join("receipts")).unwrap();
    for bad in ["../escape", "a/b", "", ".hidden", "with space"] {
        assert!(
            matches!(store.write(bad, &json!({})), Err(StoreError::InvalidRefTag(_))),
            "write accepted {bad:?}"
        );
        assert!(
            matches!(store.read(bad), Err(StoreError::InvalidRefTag(_))),
            "read accepted {bad:?}"
        );
    }
    assert!(!dir.path().join("escape.json").exists());
    assert!(!dir.path().join("receipt_..").exists());
}

#[test]
fn unrelated_files_are_not_listed() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path()).unwrap();
    store.write("LOCUS-A", &doc("LOCUS-A", 1)).unwrap();
    fs::write(dir.path().join("notes.json"), "{}").unwrap();
    fs::write(dir.path().join("receipt_.json"), "{}").unwrap();
    fs::write(dir.path().join("receipt_LOCUS-B.txt"), "{}").unwrap();
    fs::create_dir(dir.path().join("receipt_dir.json")).unwrap();

    assert_eq!(tags(&store.list().unwrap()), vec!["LOCUS-A"]);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn corrupt_file_fails_listing() {
    let dir = tempdir().unwrap();
    let store = FileReceiptStore::open(dir.path()).unwrap();
    store.write("LOCUS-A", &doc("LOCUS-A", 1)).unwrap();
    fs::write(dir.path().join("receipt_LOCUS-B.json"), "{ truncated").unwrap();

    assert!(matches!(store.list(), Err(StoreError::Json { .. })));
    assert!(matches!(store.read("LOCUS-B"), Err(StoreError::Json { .. })));
    // the good receipt is still readable on its own
    assert!(store.read("LOCUS-A").is_ok());
}

#[test]
fn typed_read_rejects_non_receipts() {
    let store = MemoryReceiptStore::new();
    store.write("LOCUS-A", &json!({"hello": "world"})).unwrap();
    assert!(matches!(store.read_receipt("LOCUS-A"), Err(StoreError::Json { .. })));
}

#[test]
fn memory_store_matches_file_store() {
    let dir = tempdir().unwrap();
    let file = FileReceiptStore::open(dir.path()).unwrap();
    let mem = MemoryReceiptStore::new();
    let stores: [&dyn ReceiptStore; 2] = [&file, &mem];

    for store in stores {
        store.write("LOCUS-Z", &doc("LOCUS-Z", 1)).unwrap();
        store.write("LOCUS-M", &doc("LOCUS-M", 2)).unwrap();
        store.write("LOCUS-M", &doc("LOCUS-M", 3)).unwrap();
        assert!(matches!(store.read("LOCUS-Q"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.write("x/y", &json!({})), Err(StoreError::InvalidRefTag(_))));
    }

    assert_eq!(file.list().unwrap(), mem.list().unwrap());
    assert_eq!(tags(&mem.list().unwrap()), vec!["LOCUS-M", "LOCUS-Z"]);
    assert_eq!(mem.read("LOCUS-M").unwrap()["timestamp"], json!(3));
}
