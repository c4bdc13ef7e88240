use std::fmt::Write;

use serde::Serialize;
use zarrs::{array::ArrayIndices, metadata::v3::MetadataV3};

/// Prefix of every chunk key.
const CHUNK_PREFIX: &str = "c";

/// The Zarr V3 `default` chunk key encoding: `c/<i0>/.../<in>`, or `c` for a 0-d array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkKeyEncoding {
    separator: char,
}

impl Default for ChunkKeyEncoding {
    fn default() -> Self {
        Self { separator: '/' }
    }
}

impl ChunkKeyEncoding {
    #[must_use]
    pub fn separator(&self) -> char {
        self.separator
    }

    /// The key of the chunk at `chunk_grid_indices`.
    #[must_use]
    pub fn encode(&self, chunk_grid_indices: &[u64]) -> String {
        let mut s = String::with_capacity(CHUNK_PREFIX.len() + chunk_grid_indices.len() * 2);
        s.push_str(CHUNK_PREFIX);
        for idx in chunk_grid_indices {
            s.push(self.separator);
            // writing to a String cannot fail
            let _ = write!(s, "{idx}");
        }
        s
    }

    /// The chunk indices named by `key`, if it is a well-formed chunk key.
    ///
    /// Indices must be written without leading zeros, so each chunk has exactly one key.
    /// Only the grammar is checked; whether the indices lie in a chunk grid is up to the caller.
    #[must_use]
    pub fn decode(&self, key: &str) -> Option<ArrayIndices> {
        let mut segments = key.split(self.separator);
        if segments.next() != Some(CHUNK_PREFIX) {
            return None;
        }
        segments
            .map(|segment| {
                let canonical = !segment.is_empty()
                    && segment.bytes().all(|b| b.is_ascii_digit())
                    && (segment == "0" || !segment.starts_with('0'));
                if canonical { segment.parse().ok() } else { None }
            })
            .collect()
    }

    /// The `chunk_key_encoding` entry of array metadata.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be serialized.
    pub fn metadata(&self) -> Result<MetadataV3, serde_json::Error> {
        MetadataV3::new_with_serializable_configuration("default".to_string(), self)
    }
}
