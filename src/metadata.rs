use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use zarrs::{
    array::{ArrayMetadataV3, FillValueMetadata},
    group::GroupMetadataV3,
    metadata::v3::{MetadataV3, NodeMetadataV3},
};

use crate::{chunk_key_encoding::ChunkKeyEncoding, error::ConfigurationError};

/// Name of the metadata document of every node.
pub const ZARR_JSON: &str = "zarr.json";

pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Fixed-size numeric element types of an array node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    #[default]
    Float32,
    Float64,
}

impl DataType {
    /// Zarr V3 name of the data type.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }

    /// Size of one element in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
        }
    }

    /// Little-endian bytes of `fill_value` as one element of this type.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidFillValue`] if the value is not representable.
    pub fn encode_fill_value(
        self,
        fill_value: &serde_json::Number,
    ) -> Result<Vec<u8>, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidFillValue {
            fill_value: fill_value.to_string(),
            data_type: self.name().into(),
        };
        macro_rules! int {
            ($t:ty) => {{
                let value = if let Some(v) = fill_value.as_i64() {
                    <$t>::try_from(v).ok()
                } else {
                    fill_value.as_u64().and_then(|v| <$t>::try_from(v).ok())
                };
                value.ok_or_else(invalid)?.to_le_bytes().to_vec()
            }};
        }
        let bytes = match self {
            DataType::Int8 => int!(i8),
            DataType::Int16 => int!(i16),
            DataType::Int32 => int!(i32),
            DataType::Int64 => int!(i64),
            DataType::UInt8 => int!(u8),
            DataType::UInt16 => int!(u16),
            DataType::UInt32 => int!(u32),
            DataType::UInt64 => int!(u64),
            DataType::Float32 => {
                let v = fill_value.as_f64().ok_or_else(invalid)?;
                if v.abs() > f64::from(f32::MAX) {
                    return Err(invalid());
                }
                (v as f32).to_le_bytes().to_vec()
            }
            DataType::Float64 => fill_value.as_f64().ok_or_else(invalid)?.to_le_bytes().to_vec(),
        };
        Ok(bytes)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize)]
struct RegularChunkGridConfiguration<'a> {
    chunk_shape: &'a [u64],
}

#[derive(Serialize)]
struct BytesCodecConfiguration {
    endian: &'static str,
}

fn regular_chunk_grid(chunk_shape: &[u64]) -> Result<MetadataV3, serde_json::Error> {
    MetadataV3::new_with_serializable_configuration(
        "regular".to_string(),
        &RegularChunkGridConfiguration { chunk_shape },
    )
}

fn little_endian_bytes_codec() -> Result<MetadataV3, serde_json::Error> {
    MetadataV3::new_with_serializable_configuration(
        "bytes".to_string(),
        &BytesCodecConfiguration { endian: "little" },
    )
}

/// Zarr V3 metadata of an uncompressed, little-endian array on a regular chunk grid.
///
/// # Errors
/// Returns an error if a configuration cannot be serialized.
pub fn array_metadata(
    shape: Vec<u64>,
    chunk_shape: &[u64],
    data_type: DataType,
    fill_value: serde_json::Number,
    attributes: Attributes,
) -> crate::Result<ArrayMetadataV3> {
    let metadata = ArrayMetadataV3::new(
        shape,
        regular_chunk_grid(chunk_shape)?,
        MetadataV3::new(data_type.name().to_string()),
        FillValueMetadata::Number(fill_value),
        vec![little_endian_bytes_codec()?],
    )
    .with_chunk_key_encoding(ChunkKeyEncoding::default().metadata()?)
    .with_attributes(attributes);
    Ok(metadata)
}

#[must_use]
pub fn group_metadata(attributes: Attributes) -> GroupMetadataV3 {
    GroupMetadataV3::default().with_attributes(attributes)
}

/// Serialize node metadata into a `zarr.json` document.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn to_document(metadata: NodeMetadataV3) -> crate::Result<Bytes> {
    Ok(Bytes::from_owner(serde_json::to_vec(&metadata)?))
}

/// Combine `zarr.json` documents keyed by store key into one consolidated document,
/// `{"metadata": {key: document, ...}}`.
///
/// # Errors
/// Returns an error if a document is not valid JSON.
pub fn consolidated_metadata<'a, I>(documents: I) -> crate::Result<Bytes>
where
    I: IntoIterator<Item = (String, &'a Bytes)>,
{
    let mut metadata = serde_json::Map::new();
    for (path, document) in documents {
        metadata.insert(path, serde_json::from_slice(document)?);
    }
    let mut root = serde_json::Map::new();
    root.insert("metadata".into(), serde_json::Value::Object(metadata));
    Ok(Bytes::from_owner(serde_json::to_vec(&root)?))
}
