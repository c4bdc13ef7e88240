use bytes::Bytes;
use futures::stream;
use zarrs::storage::{
    AsyncListableStorageTraits, AsyncMaybeBytesIterator, AsyncReadableStorageTraits,
    AsyncWritableStorageTraits, ListableStorageTraits, MaybeBytes, OffsetBytesIterator,
    StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix,
    byte_range::{ByteRange, ByteRangeIterator},
};

use super::{ViewStore, slice};

// Extraction is synchronous and runs on the polling task.

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl AsyncReadableStorageTraits for ViewStore {
    async fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Self::maybe_bytes(ViewStore::get(self, key.as_str()))
    }

    async fn get_partial(
        &self,
        key: &StoreKey,
        byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Self::maybe_bytes(ViewStore::get(self, key.as_str()))?
            .map(|data| slice(&data, byte_range))
            .transpose()
    }

    async fn get_partial_many<'a>(
        &'a self,
        key: &StoreKey,
        byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<AsyncMaybeBytesIterator<'a>, StorageError> {
        let Some(data) = Self::maybe_bytes(ViewStore::get(self, key.as_str()))? else {
            return Ok(None);
        };
        let out: Vec<_> = byte_ranges
            .map(|byte_range| slice(&data, byte_range))
            .collect();
        Ok(Some(Box::pin(stream::iter(out))))
    }

    async fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.key_size(key.as_str()))
    }

    fn supports_get_partial(&self) -> bool {
        false
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl AsyncListableStorageTraits for ViewStore {
    async fn list(&self) -> Result<StoreKeys, StorageError> {
        ListableStorageTraits::list(self)
    }

    async fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        ListableStorageTraits::list_prefix(self, prefix)
    }

    async fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        ListableStorageTraits::list_dir(self, prefix)
    }

    async fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        ListableStorageTraits::size_prefix(self, prefix)
    }

    async fn size(&self) -> Result<u64, StorageError> {
        ListableStorageTraits::size(self)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl AsyncWritableStorageTraits for ViewStore {
    async fn set(&self, _key: &StoreKey, _value: Bytes) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    async fn set_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _offset_values: OffsetBytesIterator<'a>,
    ) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    async fn erase(&self, _key: &StoreKey) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    async fn erase_prefix(&self, _prefix: &StorePrefix) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn supports_set_partial(&self) -> bool {
        false
    }
}
