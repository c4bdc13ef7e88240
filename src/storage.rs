use bytes::Bytes;
use zarrs::storage::{
    ListableStorageTraits, MaybeBytes, MaybeBytesIterator, OffsetBytesIterator,
    ReadableStorageTraits, StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix,
    WritableStorageTraits,
    byte_range::{ByteRange, ByteRangeIterator, InvalidByteRangeError},
};

use crate::{
    error::{AccessError, Error},
    metadata::{DataType, consolidated_metadata},
    node::{ArrayNode, ListEntry, StoreNode, validate_child_name},
    view::ChunkedView,
};

#[cfg(feature = "async")]
mod asynch;

/// Key of the consolidated metadata document.
pub const CONSOLIDATED_METADATA_KEY: &str = ".zmetadata";

/// A read-only Zarr V3 hierarchy over a tree of [`StoreNode`]s.
///
/// Chunks are assembled on request by calling the views' extractors; nothing is cached.
/// A named root node places the whole hierarchy under `<name>/`.
#[derive(Debug, Clone)]
pub struct ViewStore {
    root: StoreNode,
    consolidated: Bytes,
}

impl ViewStore {
    /// Create a store over `root`, rendering the consolidated metadata.
    ///
    /// # Errors
    /// Returns an error if the root has an invalid name or the metadata cannot be consolidated.
    pub fn new(root: impl Into<StoreNode>) -> crate::Result<Self> {
        let root = root.into();
        let prefix = if root.name().is_empty() {
            String::new()
        } else {
            validate_child_name(root.name())?;
            format!("{}/", root.name())
        };
        let mut documents = Vec::new();
        root.collect_metadata(&prefix, &mut documents);
        log::debug!("consolidating {} metadata document(s)", documents.len());
        let consolidated = consolidated_metadata(documents)?;
        Ok(Self { root, consolidated })
    }

    /// A store holding `view` as its root array.
    ///
    /// # Errors
    /// As [`ArrayNodeBuilder::build`](crate::node::ArrayNodeBuilder::build).
    pub fn single_array(view: ChunkedView, data_type: DataType) -> crate::Result<Self> {
        Self::new(ArrayNode::builder(view, data_type).build()?)
    }

    #[must_use]
    pub fn root(&self) -> &StoreNode {
        &self.root
    }

    /// The consolidated metadata document.
    #[must_use]
    pub fn consolidated_metadata(&self) -> &Bytes {
        &self.consolidated
    }

    /// `key` relative to the root node.
    fn relative<'a>(&self, key: &'a str) -> Option<&'a str> {
        let name = self.root.name();
        if name.is_empty() {
            Some(key)
        } else {
            key.strip_prefix(name)?.strip_prefix('/')
        }
    }

    fn absolute(&self, path: &str) -> String {
        let name = self.root.name();
        if name.is_empty() {
            path.to_string()
        } else {
            format!("{name}/{path}")
        }
    }

    /// The value under `key`; chunks are assembled on each call.
    ///
    /// # Errors
    /// Returns [`AccessError::KeyNotFound`] or [`AccessError::ChunkOutOfRange`] for missing keys,
    /// or an [`ExtractionFailure`](crate::error::ExtractionFailure) while assembling a chunk.
    pub fn get(&self, key: &str) -> crate::Result<Bytes> {
        if key == CONSOLIDATED_METADATA_KEY {
            return Ok(self.consolidated.clone());
        }
        let not_found = || Error::from(AccessError::KeyNotFound(key.to_string()));
        let relative = self.relative(key).ok_or_else(not_found)?;
        self.root.get(relative).map_err(|e| {
            if e.is_key_not_found() {
                not_found()
            } else {
                e
            }
        })
    }

    /// Size in bytes of the value under `key`, answered without extraction.
    #[must_use]
    pub fn key_size(&self, key: &str) -> Option<u64> {
        if key == CONSOLIDATED_METADATA_KEY {
            return Some(self.consolidated.len() as u64);
        }
        self.root.size(self.relative(key)?)
    }

    /// Whether `key` exists, answered without extraction.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.key_size(key).is_some()
    }

    /// Every key of the store: consolidated metadata, then the hierarchy depth first.
    ///
    /// The iterator is lazy and each call starts afresh.
    pub fn list(&self) -> impl Iterator<Item = String> + Send + '_ {
        std::iter::once(CONSOLIDATED_METADATA_KEY.to_string())
            .chain(self.root.paths().map(|path| self.absolute(&path)))
    }

    /// Immediate children of `prefix`, which is empty or ends with `/`.
    #[must_use]
    pub fn list_prefix(&self, prefix: &str) -> Vec<ListEntry> {
        let name = self.root.name();
        if prefix.is_empty() && !name.is_empty() {
            return vec![
                ListEntry::Key(CONSOLIDATED_METADATA_KEY.into()),
                ListEntry::Prefix(format!("{name}/")),
            ];
        }
        let Some(relative) = self.relative(prefix) else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        if prefix.is_empty() {
            entries.push(ListEntry::Key(CONSOLIDATED_METADATA_KEY.into()));
        }
        let children = self.root.list_dir(relative).unwrap_or_default();
        entries.extend(children.into_iter().map(|entry| match entry {
            ListEntry::Key(k) => ListEntry::Key(self.absolute(&k)),
            ListEntry::Prefix(p) => ListEntry::Prefix(self.absolute(&p)),
        }));
        entries
    }

    /// Always fails: the store is read-only.
    ///
    /// # Errors
    /// Always returns [`Error::ReadOnly`].
    pub fn set(&self, key: &str, _value: Bytes) -> crate::Result<()> {
        log::debug!("rejected write to {key}");
        Err(Error::ReadOnly)
    }

    /// Always fails: the store is read-only.
    ///
    /// # Errors
    /// Always returns [`Error::ReadOnly`].
    pub fn set_partial_values<I>(&self, key: &str, _offset_values: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = (u64, Bytes)>,
    {
        log::debug!("rejected partial write to {key}");
        Err(Error::ReadOnly)
    }

    /// Always fails: the store is read-only.
    ///
    /// # Errors
    /// Always returns [`Error::ReadOnly`].
    pub fn delete(&self, key: &str) -> crate::Result<()> {
        log::debug!("rejected deletion of {key}");
        Err(Error::ReadOnly)
    }

    /// Convert a native result, treating keys that do not exist as absent.
    fn maybe_bytes(result: crate::Result<Bytes>) -> Result<MaybeBytes, StorageError> {
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(Error::Access(AccessError::KeyNotFound(_) | AccessError::ChunkOutOfRange { .. })) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store_keys(&self, prefix: &str) -> Result<StoreKeys, StorageError> {
        let mut keys = self
            .list()
            .filter(|key| key.starts_with(prefix))
            .map(StoreKey::new)
            .collect::<Result<StoreKeys, _>>()?;
        keys.sort();
        Ok(keys)
    }
}

impl ReadableStorageTraits for ViewStore {
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.key_size(key.as_str()))
    }

    fn supports_get_partial(&self) -> bool {
        // partial reads assemble the whole chunk
        false
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Self::maybe_bytes(ViewStore::get(self, key.as_str()))
    }

    fn get_partial_many<'a>(
        &'a self,
        key: &StoreKey,
        byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        let Some(data) = Self::maybe_bytes(ViewStore::get(self, key.as_str()))? else {
            return Ok(None);
        };
        let out = Box::new(byte_ranges.map(move |byte_range| slice(&data, byte_range)));
        Ok(Some(out))
    }

    fn get_partial(
        &self,
        key: &StoreKey,
        byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Self::maybe_bytes(ViewStore::get(self, key.as_str()))?
            .map(|data| slice(&data, byte_range))
            .transpose()
    }
}

/// The bytes of `data` in `byte_range`.
fn slice(data: &Bytes, byte_range: ByteRange) -> Result<Bytes, StorageError> {
    let size = data.len() as u64;
    let valid = match byte_range {
        ByteRange::FromStart(offset, length) => offset + length.unwrap_or(0) <= size,
        ByteRange::Suffix(length) => length <= size,
    };
    if !valid {
        return Err(InvalidByteRangeError::new(byte_range, size).into());
    }
    Ok(data.slice(byte_range.to_range_usize(size)))
}

impl ListableStorageTraits for ViewStore {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        self.store_keys("")
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.store_keys(prefix.as_str())
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys = Vec::new();
        let mut prefixes = Vec::new();
        for entry in ViewStore::list_prefix(self, prefix.as_str()) {
            match entry {
                ListEntry::Key(k) => keys.push(StoreKey::new(k)?),
                ListEntry::Prefix(p) => prefixes.push(StorePrefix::new(p)?),
            }
        }
        keys.sort();
        prefixes.sort();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        Ok(self
            .list()
            .filter(|key| key.starts_with(prefix.as_str()))
            .filter_map(|key| self.key_size(&key))
            .sum())
    }

    fn size(&self) -> Result<u64, StorageError> {
        Ok(self.list().filter_map(|key| self.key_size(&key)).sum())
    }
}

impl WritableStorageTraits for ViewStore {
    fn set(&self, _key: &StoreKey, _value: Bytes) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn set_partial_many(
        &self,
        _key: &StoreKey,
        _offset_values: OffsetBytesIterator,
    ) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn erase(&self, _key: &StoreKey) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn erase_prefix(&self, _prefix: &StorePrefix) -> Result<(), StorageError> {
        Err(StorageError::ReadOnly)
    }

    fn supports_set_partial(&self) -> bool {
        false
    }
}
