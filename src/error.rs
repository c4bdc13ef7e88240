use crate::selection::Selection;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error returned by an [`Extractor`](crate::extractor::Extractor).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
    #[error("the store is read-only")]
    ReadOnly,
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Invalid caller input, detected while a view or store is being constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("malformed range for key {key} ({spec}): {reason}")]
    MalformedRange {
        key: String,
        spec: String,
        reason: String,
    },
    #[error("malformed request {request:?}: {reason}")]
    MalformedRequest { request: String, reason: String },
    #[error("key {key} has {count} values but is not mapped by an axis")]
    UnassignedKey { key: String, count: usize },
    #[error("key {key} is already mapped by another axis")]
    DuplicateKeyAssignment { key: String },
    #[error("axis key {key} is not part of the selection")]
    UnknownAxisKey { key: String },
    #[error("axis {axis} has no keys")]
    EmptyAxis { axis: usize },
    #[error("key {key} has no values")]
    EmptyValues { key: String },
    #[error("key {key} lists value {value} more than once")]
    DuplicateValue { key: String, value: String },
    #[error("at least one part is required to build a view")]
    NoParts,
    #[error("an extension axis must be given when {parts} parts are merged")]
    MissingExtensionAxis { parts: usize },
    #[error("extension axis {axis} is not valid for {ndim} axes")]
    InvalidExtensionAxis { axis: usize, ndim: usize },
    #[error("part {part} has shape {found:?}, incompatible with {expected:?} outside axis {axis}")]
    IncompatibleParts {
        part: usize,
        axis: usize,
        expected: Vec<u64>,
        found: Vec<u64>,
    },
    #[error("invalid node name {name:?}: {reason}")]
    InvalidNodeName { name: String, reason: String },
    #[error("duplicate node name {name:?}")]
    DuplicateNodeName { name: String },
    #[error("invalid fill value {fill_value} for data type {data_type}")]
    InvalidFillValue {
        fill_value: String,
        data_type: String,
    },
    #[error("record length must be non-zero")]
    ZeroRecordLength,
}

/// An access that names something outside the view or store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("coordinate {coord:?} is out of range for shape {shape:?}")]
    CoordinateOutOfRange { coord: Vec<u64>, shape: Vec<u64> },
    #[error("coordinate {coord:?} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        coord: Vec<u64>,
        expected: usize,
        found: usize,
    },
    #[error("chunk {chunk:?} is out of range for chunk grid {grid:?}")]
    ChunkOutOfRange { chunk: Vec<u64>, grid: Vec<u64> },
    #[error("key not found: {0}")]
    KeyNotFound(String),
}

/// An [`Extractor`](crate::extractor::Extractor) failure, annotated with the selection that failed.
#[derive(Debug, thiserror::Error)]
#[error("extraction failed for {selection}: {source}")]
pub struct ExtractionFailure {
    pub selection: Selection,
    pub source: BoxError,
}

impl ExtractionFailure {
    pub fn new(selection: Selection, source: impl Into<BoxError>) -> Self {
        Self {
            selection,
            source: source.into(),
        }
    }
}

impl Error {
    /// Whether this error is a missing store key.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Error::Access(AccessError::KeyNotFound(_)))
    }
}

impl From<Error> for zarrs::storage::StorageError {
    fn from(value: Error) -> Self {
        match value {
            Error::ReadOnly => Self::ReadOnly,
            e => Self::Other(e.to_string()),
        }
    }
}
