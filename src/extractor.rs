//! The collaborator that turns a single-valued [`Selection`] into a record of bytes.

use std::{collections::HashMap, fmt};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{error::BoxError, selection::Selection};

/// How the bytes behind a selection are to be produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Decode a GRIB message into its values.
    #[default]
    Grib,
    /// Return the stored bytes unchanged.
    Raw,
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractorKind::Grib => f.write_str("grib"),
            ExtractorKind::Raw => f.write_str("raw"),
        }
    }
}

/// Produces the record for a single-valued selection.
///
/// Every record of one array must have the same byte length, little-endian, of the array's
/// data type. Implementations are shared between threads and may block.
pub trait Extractor: Send + Sync {
    /// Extract the record identified by `selection`.
    ///
    /// # Errors
    /// Any error is reported to the caller as an
    /// [`ExtractionFailure`](crate::error::ExtractionFailure) carrying `selection`.
    fn extract(&self, selection: &Selection, kind: ExtractorKind) -> Result<Bytes, BoxError>;
}

impl<F> Extractor for F
where
    F: Fn(&Selection, ExtractorKind) -> Result<Bytes, BoxError> + Send + Sync,
{
    fn extract(&self, selection: &Selection, kind: ExtractorKind) -> Result<Bytes, BoxError> {
        self(selection, kind)
    }
}

/// An [`Extractor`] over records held in memory, looked up irrespective of key order.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    records: HashMap<String, Bytes>,
}

impl MemoryExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under `selection`, returning any record it replaces.
    pub fn insert(&mut self, selection: &Selection, record: impl Into<Bytes>) -> Option<Bytes> {
        self.records.insert(selection.canonical(), record.into())
    }

    #[must_use]
    pub fn with(mut self, selection: &Selection, record: impl Into<Bytes>) -> Self {
        self.insert(selection, record);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Extractor for MemoryExtractor {
    fn extract(&self, selection: &Selection, _kind: ExtractorKind) -> Result<Bytes, BoxError> {
        self.records
            .get(&selection.canonical())
            .cloned()
            .ok_or_else(|| format!("no record for {selection}").into())
    }
}
