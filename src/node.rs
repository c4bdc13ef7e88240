//! Array and group nodes of a view hierarchy, addressed by keys relative to the node.

use bytes::Bytes;
use zarrs::{
    array::{ArrayIndices, ArraySubset},
    metadata::v3::NodeMetadataV3,
};

use crate::{
    chunk::{RecordLayout, assemble_chunk, chunk_size},
    chunk_key_encoding::ChunkKeyEncoding,
    error::{AccessError, ConfigurationError},
    metadata::{Attributes, DataType, ZARR_JSON, array_metadata, group_metadata, to_document},
    view::ChunkedView,
};

/// An immediate child of a listed prefix, relative to the node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListEntry {
    Key(String),
    /// Always ends with `/`.
    Prefix(String),
}

/// A node of the hierarchy exposed by a [`ViewStore`](crate::storage::ViewStore).
#[derive(Debug, Clone)]
pub enum StoreNode {
    Array(ArrayNode),
    Group(GroupNode),
}

impl From<ArrayNode> for StoreNode {
    fn from(value: ArrayNode) -> Self {
        Self::Array(value)
    }
}

impl From<GroupNode> for StoreNode {
    fn from(value: GroupNode) -> Self {
        Self::Group(value)
    }
}

impl StoreNode {
    /// Name of the node within its parent; empty for an unnamed root.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            StoreNode::Array(a) => &a.name,
            StoreNode::Group(g) => &g.name,
        }
    }

    /// The node's `zarr.json` document.
    #[must_use]
    pub fn metadata(&self) -> &Bytes {
        match self {
            StoreNode::Array(a) => &a.metadata,
            StoreNode::Group(g) => &g.metadata,
        }
    }

    /// Every key below this node, depth first: own metadata, then chunks or children.
    #[must_use]
    pub fn paths(&self) -> Box<dyn Iterator<Item = String> + Send + '_> {
        match self {
            StoreNode::Array(a) => Box::new(a.paths()),
            StoreNode::Group(g) => Box::new(g.paths()),
        }
    }

    /// The value stored under `key`.
    ///
    /// # Errors
    /// Returns [`AccessError::KeyNotFound`] or [`AccessError::ChunkOutOfRange`] for keys that do
    /// not exist, or any error raised while assembling a chunk.
    pub fn get(&self, key: &str) -> crate::Result<Bytes> {
        match self {
            StoreNode::Array(a) => a.get(key),
            StoreNode::Group(g) => g.get(key),
        }
    }

    /// Size in bytes of the value under `key`, without extracting anything.
    #[must_use]
    pub fn size(&self, key: &str) -> Option<u64> {
        match self {
            StoreNode::Array(a) => a.size(key),
            StoreNode::Group(g) => g.size(key),
        }
    }

    /// Immediate children of `prefix`, which is empty or ends with `/`.
    ///
    /// Returns [`None`] if nothing lies under `prefix`.
    #[must_use]
    pub fn list_dir(&self, prefix: &str) -> Option<Vec<ListEntry>> {
        match self {
            StoreNode::Array(a) => a.list_dir(prefix),
            StoreNode::Group(g) => g.list_dir(prefix),
        }
    }

    /// Push `(store key, document)` for this node and every descendant, keys under `prefix`.
    pub(crate) fn collect_metadata<'a>(
        &'a self,
        prefix: &str,
        out: &mut Vec<(String, &'a Bytes)>,
    ) {
        out.push((format!("{prefix}{ZARR_JSON}"), self.metadata()));
        if let StoreNode::Group(g) = self {
            for child in &g.children {
                child.collect_metadata(&format!("{prefix}{}/", child.name()), out);
            }
        }
    }
}

fn key_not_found(key: &str) -> crate::Error {
    AccessError::KeyNotFound(key.to_string()).into()
}

pub(crate) fn validate_child_name(name: &str) -> Result<(), ConfigurationError> {
    let reason = if name.is_empty() {
        "child names must not be empty"
    } else if name.contains('/') {
        "names must not contain '/'"
    } else if name == "." || name == ".." {
        "names must not be relative path segments"
    } else if name == ZARR_JSON || name.starts_with("__") {
        "name is reserved"
    } else {
        return Ok(());
    };
    Err(ConfigurationError::InvalidNodeName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// A [`ChunkedView`] exposed as a Zarr V3 array.
///
/// With a record length `n` every extracted record is `n` elements and the array has a trailing
/// dimension of extent `n`, held in a single chunk.
#[derive(Debug, Clone)]
pub struct ArrayNode {
    name: String,
    view: ChunkedView,
    layout: RecordLayout,
    fill_record: Vec<u8>,
    shape: ArrayIndices,
    chunk_grid_shape: ArrayIndices,
    encoding: ChunkKeyEncoding,
    metadata: Bytes,
}

/// Builds an [`ArrayNode`].
#[derive(Debug, Clone)]
pub struct ArrayNodeBuilder {
    view: ChunkedView,
    data_type: DataType,
    name: String,
    fill_value: serde_json::Number,
    record_length: Option<u64>,
    attributes: Attributes,
}

impl ArrayNodeBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Value of elements past the edge of the view. Defaults to 0.
    #[must_use]
    pub fn fill_value(mut self, fill_value: impl Into<serde_json::Number>) -> Self {
        self.fill_value = fill_value.into();
        self
    }

    #[must_use]
    pub fn record_length(mut self, record_length: Option<u64>) -> Self {
        self.record_length = record_length;
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Validate the layout and render the array metadata.
    ///
    /// # Errors
    /// Returns a [`ConfigurationError`] for a zero record length or a fill value the data type
    /// cannot hold.
    pub fn build(self) -> crate::Result<ArrayNode> {
        if self.record_length == Some(0) {
            return Err(ConfigurationError::ZeroRecordLength.into());
        }
        let layout = RecordLayout {
            data_type: self.data_type,
            record_length: self.record_length,
        };
        let fill_element = self.data_type.encode_fill_value(&self.fill_value)?;
        let fill_record = fill_element.repeat(layout.elements() as usize);

        let mut shape = self.view.shape().to_vec();
        let mut chunk_shape = self.view.chunk_shape().to_vec();
        let mut chunk_grid_shape = self.view.chunk_count_per_dim().to_vec();
        if let Some(n) = self.record_length {
            shape.push(n);
            chunk_shape.push(n);
            chunk_grid_shape.push(1);
        }

        let metadata = array_metadata(
            shape.clone(),
            &chunk_shape,
            self.data_type,
            self.fill_value,
            self.attributes,
        )?;
        let metadata = to_document(NodeMetadataV3::Array(metadata))?;
        log::debug!(
            "built array node {:?}: shape {shape:?}, chunk shape {chunk_shape:?}, {}",
            self.name,
            self.data_type
        );
        Ok(ArrayNode {
            name: self.name,
            view: self.view,
            layout,
            fill_record,
            shape,
            chunk_grid_shape,
            encoding: ChunkKeyEncoding::default(),
            metadata,
        })
    }
}

impl ArrayNode {
    /// Start building an array node over `view`.
    #[must_use]
    pub fn builder(view: ChunkedView, data_type: DataType) -> ArrayNodeBuilder {
        ArrayNodeBuilder {
            view,
            data_type,
            name: String::new(),
            fill_value: 0.into(),
            record_length: None,
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn view(&self) -> &ChunkedView {
        &self.view
    }

    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Shape of the stored array, including any record dimension.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Number of chunks along each stored dimension.
    #[must_use]
    pub fn chunk_grid_shape(&self) -> &[u64] {
        &self.chunk_grid_shape
    }

    /// Chunk indices of the view for a chunk key, or [`None`] if `key` is not a chunk key.
    fn view_chunk(&self, key: &str) -> Option<Result<ArrayIndices, AccessError>> {
        let indices = self.encoding.decode(key)?;
        let in_grid = indices.len() == self.chunk_grid_shape.len()
            && std::iter::zip(&indices, &self.chunk_grid_shape).all(|(i, n)| i < n);
        if !in_grid {
            log::warn!(
                "chunk key {key} is out of range for chunk grid {:?}",
                self.chunk_grid_shape
            );
            return Some(Err(AccessError::ChunkOutOfRange {
                chunk: indices,
                grid: self.chunk_grid_shape.clone(),
            }));
        }
        let mut indices = indices;
        indices.truncate(self.view.ndim());
        Some(Ok(indices))
    }

    fn get(&self, key: &str) -> crate::Result<Bytes> {
        if key == ZARR_JSON {
            return Ok(self.metadata.clone());
        }
        match self.view_chunk(key) {
            Some(Ok(chunk)) => assemble_chunk(&self.view, &chunk, self.layout, &self.fill_record),
            Some(Err(e)) => Err(e.into()),
            None => Err(key_not_found(key)),
        }
    }

    fn size(&self, key: &str) -> Option<u64> {
        if key == ZARR_JSON {
            return Some(self.metadata.len() as u64);
        }
        self.view_chunk(key)?
            .ok()
            .map(|_| chunk_size(&self.view, self.layout))
    }

    fn paths(&self) -> impl Iterator<Item = String> + Send + '_ {
        let chunks = ArraySubset::new_with_shape(self.chunk_grid_shape.clone())
            .indices()
            .into_iter()
            .map(|indices| self.encoding.encode(&indices));
        std::iter::once(ZARR_JSON.to_string()).chain(chunks)
    }

    fn list_dir(&self, prefix: &str) -> Option<Vec<ListEntry>> {
        let separator = self.encoding.separator();
        let ndim = self.chunk_grid_shape.len();
        if prefix.is_empty() {
            let chunks = if ndim == 0 {
                ListEntry::Key("c".into())
            } else {
                ListEntry::Prefix(format!("c{separator}"))
            };
            return Some(vec![ListEntry::Key(ZARR_JSON.into()), chunks]);
        }
        // a prefix of a chunk key: `c/`, `c/i0/`, ...
        let parent = self.encoding.decode(prefix.strip_suffix(separator)?)?;
        let depth = parent.len();
        if depth >= ndim
            || std::iter::zip(&parent, &self.chunk_grid_shape).any(|(i, n)| i >= n)
        {
            return None;
        }
        let entries = (0..self.chunk_grid_shape[depth])
            .map(|i| {
                if depth + 1 == ndim {
                    ListEntry::Key(format!("{prefix}{i}"))
                } else {
                    ListEntry::Prefix(format!("{prefix}{i}{separator}"))
                }
            })
            .collect();
        Some(entries)
    }
}

/// A group of uniquely named child nodes.
#[derive(Debug, Clone)]
pub struct GroupNode {
    name: String,
    children: Vec<StoreNode>,
    attributes: Attributes,
    metadata: Bytes,
}

impl GroupNode {
    /// A group holding `children` in the given order.
    ///
    /// # Errors
    /// Returns a [`ConfigurationError`] if a child name is empty, contains `/`, is reserved, or
    /// is used twice.
    pub fn new(name: impl Into<String>, children: Vec<StoreNode>) -> crate::Result<Self> {
        for (i, child) in children.iter().enumerate() {
            validate_child_name(child.name())?;
            if children[..i].iter().any(|c| c.name() == child.name()) {
                return Err(ConfigurationError::DuplicateNodeName {
                    name: child.name().to_string(),
                }
                .into());
            }
        }
        let attributes = Attributes::new();
        let metadata = to_document(NodeMetadataV3::Group(group_metadata(attributes.clone())))?;
        Ok(Self {
            name: name.into(),
            children,
            attributes,
            metadata,
        })
    }

    /// Replace the group attributes.
    ///
    /// # Errors
    /// Returns an error if the metadata cannot be rendered.
    pub fn with_attributes(mut self, attributes: Attributes) -> crate::Result<Self> {
        self.metadata = to_document(NodeMetadataV3::Group(group_metadata(attributes.clone())))?;
        self.attributes = attributes;
        Ok(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn children(&self) -> &[StoreNode] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&StoreNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    fn get(&self, key: &str) -> crate::Result<Bytes> {
        if key == ZARR_JSON {
            return Ok(self.metadata.clone());
        }
        let (name, rest) = key.split_once('/').ok_or_else(|| key_not_found(key))?;
        match self.child(name) {
            Some(child) => child.get(rest).map_err(|e| match e {
                crate::Error::Access(AccessError::KeyNotFound(_)) => key_not_found(key),
                e => e,
            }),
            None => Err(key_not_found(key)),
        }
    }

    fn size(&self, key: &str) -> Option<u64> {
        if key == ZARR_JSON {
            return Some(self.metadata.len() as u64);
        }
        let (name, rest) = key.split_once('/')?;
        self.child(name)?.size(rest)
    }

    fn paths(&self) -> impl Iterator<Item = String> + Send + '_ {
        let children = self.children.iter().flat_map(|child| {
            let name = child.name();
            child.paths().map(move |path| format!("{name}/{path}"))
        });
        std::iter::once(ZARR_JSON.to_string()).chain(children)
    }

    fn list_dir(&self, prefix: &str) -> Option<Vec<ListEntry>> {
        if prefix.is_empty() {
            let mut entries = vec![ListEntry::Key(ZARR_JSON.into())];
            entries.extend(
                self.children
                    .iter()
                    .map(|c| ListEntry::Prefix(format!("{}/", c.name()))),
            );
            return Some(entries);
        }
        let (name, rest) = prefix.split_once('/')?;
        let entries = self.child(name)?.list_dir(rest)?;
        Some(
            entries
                .into_iter()
                .map(|entry| match entry {
                    ListEntry::Key(k) => ListEntry::Key(format!("{name}/{k}")),
                    ListEntry::Prefix(p) => ListEntry::Prefix(format!("{name}/{p}")),
                })
                .collect(),
        )
    }
}
