#![cfg(feature = "async")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use futures::StreamExt;
use zarrs::storage::{
    AsyncListableStorageTraits, AsyncReadableStorageTraits, AsyncWritableStorageTraits,
    ReadableStorageTraits, StorageError, StoreKey, StorePrefix, byte_range::ByteRange,
};
use zarrs_chunked_view::axis::AxisDefinition;
use zarrs_chunked_view::extractor::ExtractorKind;
use zarrs_chunked_view::metadata::DataType;
use zarrs_chunked_view::node::{ArrayNode, GroupNode};
use zarrs_chunked_view::part::Part;
use zarrs_chunked_view::selection::Selection;
use zarrs_chunked_view::storage::ViewStore;
use zarrs_chunked_view::view::build;
use zarrs_chunked_view::BoxError;

fn init_logger() {
    env_logger::try_init().ok();
}

/// Group with one 3x2 array `a` of 4-byte records `[step, number, step, number]`.
fn store(calls: Arc<AtomicUsize>) -> ViewStore {
    let extractor = move |selection: &Selection, _: ExtractorKind| -> Result<Bytes, BoxError> {
        calls.fetch_add(1, Ordering::SeqCst);
        let step: u8 = selection.value("step").ok_or("no step")?.parse()?;
        let number: u8 = selection.value("number").ok_or("no number")?.parse()?;
        Ok(Bytes::from(vec![step, number, step, number]))
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
    let view = build(Arc::new(extractor), vec![part], None).unwrap();
    let a = ArrayNode::builder(view, DataType::UInt32)
        .name("a")
        .build()
        .unwrap();
    ViewStore::new(GroupNode::new("", vec![a.into()]).unwrap()).unwrap()
}

fn key(k: &str) -> StoreKey {
    StoreKey::new(k).unwrap()
}

#[tokio::test]
async fn async_get() {
    init_logger();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = store(calls.clone());

    assert_eq!(
        AsyncReadableStorageTraits::get(&store, &key("a/c/2/1")).await.unwrap(),
        Some(Bytes::from_static(&[12, 2, 12, 2]))
    );
    assert_eq!(
        AsyncReadableStorageTraits::get(&store, &key("a/zarr.json"))
            .await
            .unwrap(),
        ReadableStorageTraits::get(&store, &key("a/zarr.json")).unwrap()
    );
    assert_eq!(
        AsyncReadableStorageTraits::get(&store, &key("a/c/3/0")).await.unwrap(),
        None
    );
    assert_eq!(
        AsyncReadableStorageTraits::get(&store, &key("missing")).await.unwrap(),
        None
    );
    assert_eq!(
        AsyncReadableStorageTraits::size_key(&store, &key("a/c/0/0"))
            .await
            .unwrap(),
        Some(4)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_get_partial_many() {
    init_logger();
    let store = store(Arc::new(AtomicUsize::new(0)));

    let ranges = vec![ByteRange::new(1..3), ByteRange::Suffix(1)];
    let parts: Vec<_> = AsyncReadableStorageTraits::get_partial_many(
        &store,
        &key("a/c/1/0"),
        Box::new(ranges.into_iter()),
    )
    .await
    .unwrap()
    .unwrap()
    .collect()
    .await;
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].as_ref().unwrap(), &Bytes::from_static(&[1, 6]));
    assert_eq!(parts[1].as_ref().unwrap(), &Bytes::from_static(&[1]));

    // same slices as the sync path, including out-of-bounds ranges
    let ranges = vec![ByteRange::new(0..2), ByteRange::Suffix(5)];
    let parts: Vec<_> = AsyncReadableStorageTraits::get_partial_many(
        &store,
        &key("a/c/0/1"),
        Box::new(ranges.into_iter()),
    )
    .await
    .unwrap()
    .unwrap()
    .collect()
    .await;
    assert_eq!(parts[0].as_ref().unwrap(), &Bytes::from_static(&[0, 2]));
    assert!(matches!(parts[1], Err(StorageError::InvalidByteRangeError(_))));

    assert!(
        AsyncReadableStorageTraits::get_partial_many(
            &store,
            &key("a/c/9/9"),
            Box::new(std::iter::once(ByteRange::new(0..1))),
        )
        .await
        .unwrap()
        .is_none()
    );
}

#[tokio::test]
async fn async_list_dir() {
    init_logger();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = store(calls.clone());

    let root = AsyncListableStorageTraits::list_dir(&store, &StorePrefix::new("").unwrap())
        .await
        .unwrap();
    assert_eq!(root.keys(), &[key(".zmetadata"), key("zarr.json")]);
    assert_eq!(root.prefixes(), &[StorePrefix::new("a/").unwrap()]);

    let chunks = AsyncListableStorageTraits::list_dir(&store, &StorePrefix::new("a/c/").unwrap())
        .await
        .unwrap();
    assert!(chunks.keys().is_empty());
    assert_eq!(chunks.prefixes().len(), 3);

    assert_eq!(
        AsyncListableStorageTraits::list(&store).await.unwrap().len(),
        1 + 1 + 1 + 6
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn async_writes_rejected() {
    init_logger();
    let store = store(Arc::new(AtomicUsize::new(0)));
    let before = ReadableStorageTraits::get(&store, &key("a/c/0/0")).unwrap();

    assert!(matches!(
        AsyncWritableStorageTraits::set(&store, &key("a/c/0/0"), Bytes::from_static(&[0; 4]))
            .await,
        Err(StorageError::ReadOnly)
    ));
    assert!(matches!(
        AsyncWritableStorageTraits::erase(&store, &key("zarr.json")).await,
        Err(StorageError::ReadOnly)
    ));
    assert!(matches!(
        AsyncWritableStorageTraits::erase_prefix(&store, &StorePrefix::new("a/").unwrap()).await,
        Err(StorageError::ReadOnly)
    ));
    assert!(!AsyncWritableStorageTraits::supports_set_partial(&store));

    assert_eq!(
        ReadableStorageTraits::get(&store, &key("a/c/0/0")).unwrap(),
        before
    );
    assert!(store.contains("zarr.json"));
}
