use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use serde_json::Value;
use zarrs::storage::{
    ListableStorageTraits, ReadableStorageTraits, StorageError, StoreKey, StorePrefix,
    WritableStorageTraits, byte_range::ByteRange,
};
use zarrs_chunked_view::axis::AxisDefinition;
use zarrs_chunked_view::extractor::ExtractorKind;
use zarrs_chunked_view::metadata::DataType;
use zarrs_chunked_view::node::{ArrayNode, GroupNode, ListEntry};
use zarrs_chunked_view::part::Part;
use zarrs_chunked_view::selection::Selection;
use zarrs_chunked_view::storage::{CONSOLIDATED_METADATA_KEY, ViewStore};
use zarrs_chunked_view::view::{ChunkedView, build};
use zarrs_chunked_view::{AccessError, BoxError, Error};

fn init_logger() {
    env_logger::try_init().ok();
}

/// A 3x2 view of single-byte records, counting extractor calls.
fn view(calls: Arc<AtomicUsize>) -> ChunkedView {
    let extractor = move |selection: &Selection, _: ExtractorKind| -> Result<Bytes, BoxError> {
        calls.fetch_add(1, Ordering::SeqCst);
        let step: u8 = selection.value("step").ok_or("no step")?.parse()?;
        let number: u8 = selection.value("number").ok_or("no number")?.parse()?;
        Ok(Bytes::from(vec![step + number]))
    };
    let part = Part::from_request(
        "class=od,stream=enfo,step=0/to/12/by/6,number=1/2",
        vec![
            AxisDefinition::single_value(["step"]),
            AxisDefinition::single_value(["number"]),
        ],
        ExtractorKind::Grib,
    )
    .unwrap();
    build(Arc::new(extractor), vec![part], None).unwrap()
}

fn array_store(calls: Arc<AtomicUsize>) -> ViewStore {
    ViewStore::single_array(view(calls), DataType::UInt8).unwrap()
}

fn group_store(calls: Arc<AtomicUsize>) -> ViewStore {
    let a = ArrayNode::builder(view(calls.clone()), DataType::UInt8)
        .name("a")
        .build()
        .unwrap();
    let b = ArrayNode::builder(view(calls), DataType::UInt8)
        .name("b")
        .build()
        .unwrap();
    let inner = GroupNode::new("inner", vec![b.into()]).unwrap();
    ViewStore::new(GroupNode::new("", vec![a.into(), inner.into()]).unwrap()).unwrap()
}

#[test]
fn test_native_get() {
    init_logger();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = array_store(calls.clone());
    assert_eq!(store.get("c/2/1").unwrap(), Bytes::from_static(&[14]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(store.get("c/3/0").is_err());
    assert!(store.get("c/0").is_err());
    assert!(store.get("c/02/1").is_err());
    assert!(!store.contains("c/02/1"));
    assert_eq!(store.key_size("c/2/01"), None);
    assert!(store.get("nothing").unwrap_err().is_key_not_found());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_read_only() {
    init_logger();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = array_store(calls.clone());
    let before: Vec<String> = store.list().collect();
    let metadata = store.get("zarr.json").unwrap();

    assert!(matches!(
        store.set("zarr.json", Bytes::from_static(b"{}")),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(store.delete("c/0/0"), Err(Error::ReadOnly)));
    assert!(matches!(
        store.set_partial_values("c/0/0", [(0, Bytes::from_static(&[1]))]),
        Err(Error::ReadOnly)
    ));

    let key = StoreKey::new("zarr.json").unwrap();
    assert!(matches!(
        WritableStorageTraits::set(&store, &key, Bytes::new()),
        Err(StorageError::ReadOnly)
    ));
    assert!(matches!(
        WritableStorageTraits::erase(&store, &key),
        Err(StorageError::ReadOnly)
    ));
    assert!(matches!(
        store.erase_prefix(&StorePrefix::new("").unwrap()),
        Err(StorageError::ReadOnly)
    ));
    assert!(!store.supports_set_partial());

    assert_eq!(store.list().collect::<Vec<_>>(), before);
    assert_eq!(store.get("zarr.json").unwrap(), metadata);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_list() {
    init_logger();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = group_store(calls.clone());
    let keys: Vec<String> = store.list().collect();
    assert_eq!(keys[0], CONSOLIDATED_METADATA_KEY);
    assert_eq!(keys[1], "zarr.json");
    assert_eq!(keys[2], "a/zarr.json");
    assert_eq!(keys[3], "a/c/0/0");
    // 1 + 1 + (1 + 6) + 1 + (1 + 6)
    assert_eq!(keys.len(), 17);
    assert!(keys.contains(&"inner/b/c/2/1".to_string()));
    // restartable
    assert_eq!(store.list().count(), keys.len());
    for key in &keys {
        assert!(store.contains(key), "{key}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_list_prefix() {
    init_logger();
    let store = group_store(Arc::new(AtomicUsize::new(0)));
    assert_eq!(
        store.list_prefix(""),
        [
            ListEntry::Key(CONSOLIDATED_METADATA_KEY.into()),
            ListEntry::Key("zarr.json".into()),
            ListEntry::Prefix("a/".into()),
            ListEntry::Prefix("inner/".into()),
        ]
    );
    assert_eq!(
        store.list_prefix("inner/"),
        [
            ListEntry::Key("inner/zarr.json".into()),
            ListEntry::Prefix("inner/b/".into()),
        ]
    );
    assert_eq!(
        store.list_prefix("inner/b/c/1/"),
        [
            ListEntry::Key("inner/b/c/1/0".into()),
            ListEntry::Key("inner/b/c/1/1".into()),
        ]
    );
    assert!(store.list_prefix("missing/").is_empty());
}

#[test]
fn test_consolidated_metadata() {
    init_logger();
    let store = group_store(Arc::new(AtomicUsize::new(0)));
    let consolidated: Value =
        serde_json::from_slice(&store.get(CONSOLIDATED_METADATA_KEY).unwrap()).unwrap();
    let metadata = consolidated["metadata"].as_object().unwrap();
    let mut keys: Vec<_> = metadata.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["a/zarr.json", "inner/b/zarr.json", "inner/zarr.json", "zarr.json"]
    );
    assert_eq!(metadata["zarr.json"]["node_type"], "group");
    assert_eq!(metadata["inner/b/zarr.json"]["node_type"], "array");
    assert_eq!(metadata["inner/b/zarr.json"]["shape"], serde_json::json!([3, 2]));

    // every listed metadata document, and nothing else
    let listed: Vec<String> = store
        .list()
        .filter(|key| key.ends_with("zarr.json"))
        .collect();
    assert_eq!(listed.len(), keys.len());
    for key in listed {
        let document: Value = serde_json::from_slice(&store.get(&key).unwrap()).unwrap();
        assert_eq!(metadata[&key], document);
    }
}

#[test]
fn test_consolidated_single_array() {
    init_logger();
    let store = array_store(Arc::new(AtomicUsize::new(0)));
    let consolidated: Value =
        serde_json::from_slice(store.consolidated_metadata()).unwrap();
    let metadata = consolidated["metadata"].as_object().unwrap();
    assert_eq!(metadata.keys().collect::<Vec<_>>(), ["zarr.json"]);
    assert_eq!(metadata["zarr.json"]["node_type"], "array");
}

#[test]
fn test_zarrs_traits() {
    init_logger();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = group_store(calls.clone());

    let key = |k: &str| StoreKey::new(k).unwrap();
    assert_eq!(
        ReadableStorageTraits::get(&store, &key("a/c/1/1")).unwrap(),
        Some(Bytes::from_static(&[8]))
    );
    assert_eq!(ReadableStorageTraits::get(&store, &key("a/c/9/9")).unwrap(), None);
    assert_eq!(ReadableStorageTraits::get(&store, &key("missing")).unwrap(), None);
    assert_eq!(store.size_key(&key("a/c/0/0")).unwrap(), Some(1));
    assert_eq!(store.size_key(&key("a/c/3/0")).unwrap(), None);
    assert_eq!(
        store
            .get_partial(&key("a/zarr.json"), ByteRange::new(0..1))
            .unwrap(),
        Some(Bytes::from_static(b"{"))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        store.get_partial(&key("a/c/0/0"), ByteRange::Suffix(2)),
        Err(StorageError::InvalidByteRangeError(_))
    ));

    let listed = ListableStorageTraits::list(&store).unwrap();
    assert_eq!(listed.len(), 17);
    assert!(listed.windows(2).all(|w| w[0] <= w[1]));

    let under_inner = ListableStorageTraits::list_prefix(
        &store,
        &StorePrefix::new("inner/").unwrap(),
    )
    .unwrap();
    assert_eq!(under_inner.len(), 1 + 1 + 6);

    let dir = store.list_dir(&StorePrefix::new("a/").unwrap()).unwrap();
    assert_eq!(dir.keys(), &[key("a/zarr.json")]);
    assert_eq!(dir.prefixes(), &[StorePrefix::new("a/c/").unwrap()]);

    assert_eq!(
        store
            .size_prefix(&StorePrefix::new("a/c/").unwrap())
            .unwrap(),
        6
    );
}

#[test]
fn test_named_root() {
    init_logger();
    let node = ArrayNode::builder(view(Arc::new(AtomicUsize::new(0))), DataType::UInt8)
        .name("ensemble")
        .build()
        .unwrap();
    let store = ViewStore::new(node).unwrap();
    let keys: Vec<String> = store.list().collect();
    assert_eq!(keys[1], "ensemble/zarr.json");
    assert!(store.contains("ensemble/c/0/1"));
    assert!(!store.contains("zarr.json"));
    assert_eq!(store.get("ensemble/c/1/1").unwrap(), Bytes::from_static(&[8]));
    assert_eq!(
        store.list_prefix(""),
        [
            ListEntry::Key(CONSOLIDATED_METADATA_KEY.into()),
            ListEntry::Prefix("ensemble/".into()),
        ]
    );

    let consolidated: Value =
        serde_json::from_slice(store.consolidated_metadata()).unwrap();
    assert!(consolidated["metadata"]["ensemble/zarr.json"].is_object());
}

#[test]
fn test_extraction_failure() {
    init_logger();
    let extractor = |_: &Selection, _: ExtractorKind| -> Result<Bytes, BoxError> {
        Err("database unavailable".into())
    };
    let part = Part::from_request(
        "step=0/6",
        vec![AxisDefinition::single_value(["step"])],
        ExtractorKind::Grib,
    )
    .unwrap();
    let view = build(Arc::new(extractor), vec![part], None).unwrap();
    let store = ViewStore::single_array(view, DataType::Float32).unwrap();
    match store.get("c/1") {
        Err(Error::Extraction(failure)) => {
            assert_eq!(failure.selection.value("step"), Some("6"));
        }
        other => panic!("unexpected {other:?}"),
    }
    let key = StoreKey::new("c/1").unwrap();
    assert!(matches!(
        ReadableStorageTraits::get(&store, &key),
        Err(StorageError::Other(_))
    ));
    assert!(matches!(
        store.get("c/2"),
        Err(Error::Access(AccessError::ChunkOutOfRange { .. }))
    ));
}
