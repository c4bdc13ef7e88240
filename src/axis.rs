use serde::{Deserialize, Serialize};
use zarrs::array::{ravel_indices, unravel_index};

use crate::{error::ConfigurationError, selection::Selection};

/// How an axis is split into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chunking {
    /// The whole axis is one chunk.
    None,
    /// Every coordinate along the axis is its own chunk.
    #[default]
    SingleValue,
}

impl Chunking {
    /// Chunk extent along an axis of the given extent.
    #[must_use]
    pub fn chunk_extent(self, extent: u64) -> u64 {
        match self {
            Chunking::None => extent.max(1),
            Chunking::SingleValue => 1,
        }
    }
}

/// The keys that together make up one axis of a part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisDefinition {
    /// Keys in significance order; the last key varies fastest.
    pub keys: Vec<String>,
    #[serde(default)]
    pub chunking: Chunking,
}

impl AxisDefinition {
    pub fn new<I, K>(keys: I, chunking: Chunking) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            chunking,
        }
    }

    /// An axis chunked one coordinate at a time.
    pub fn single_value<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(keys, Chunking::SingleValue)
    }

    /// An axis held in a single chunk.
    pub fn unchunked<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(keys, Chunking::None)
    }
}

/// An [`AxisDefinition`] bound to the expanded values of its keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    keys: Vec<String>,
    values: Vec<Vec<String>>,
    radices: Vec<u64>,
    extent: u64,
    chunking: Chunking,
}

impl Axis {
    /// Bind `definition` to the values in the already-expanded `selection`.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::UnknownAxisKey`] if a key is not in the selection.
    pub(crate) fn new(
        definition: &AxisDefinition,
        selection: &Selection,
    ) -> Result<Self, ConfigurationError> {
        let values = definition
            .keys
            .iter()
            .map(|key| {
                selection
                    .get(key)
                    .map(<[String]>::to_vec)
                    .ok_or_else(|| ConfigurationError::UnknownAxisKey { key: key.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let radices: Vec<u64> = values.iter().map(|v| v.len() as u64).collect();
        let extent = radices.iter().product();
        Ok(Self {
            keys: definition.keys.clone(),
            values,
            radices,
            extent,
            chunking: definition.chunking,
        })
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of value combinations along this axis.
    #[must_use]
    pub fn extent(&self) -> u64 {
        self.extent
    }

    #[must_use]
    pub fn chunking(&self) -> Chunking {
        self.chunking
    }

    #[must_use]
    pub fn chunk_extent(&self) -> u64 {
        self.chunking.chunk_extent(self.extent)
    }

    /// The key/value pairs at position `index` along the axis.
    #[must_use]
    pub fn combination(&self, index: u64) -> Option<Vec<(&str, &str)>> {
        let digits = unravel_index(index, &self.radices)?;
        Some(
            self.keys
                .iter()
                .zip(&self.values)
                .zip(digits)
                .map(|((key, values), digit)| (key.as_str(), values[digit as usize].as_str()))
                .collect(),
        )
    }

    /// Position along the axis of the values that `lookup` gives for this axis' keys.
    pub fn index_of<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Option<u64> {
        let digits = self
            .keys
            .iter()
            .zip(&self.values)
            .map(|(key, values)| {
                let value = lookup(key)?;
                values.iter().position(|v| v == value).map(|p| p as u64)
            })
            .collect::<Option<Vec<_>>>()?;
        ravel_indices(&digits, &self.radices)
    }

    /// Every combination in axis order.
    pub fn combinations(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        (0..self.extent).filter_map(|index| self.combination(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_time_axis() -> Axis {
        let selection = Selection::new()
            .with("date", ["d0", "d1"])
            .with("time", ["t0", "t1", "t2"]);
        Axis::new(&AxisDefinition::single_value(["date", "time"]), &selection).unwrap()
    }

    #[test]
    fn rightmost_key_fastest() {
        let axis = date_time_axis();
        assert_eq!(axis.extent(), 6);
        assert_eq!(axis.combination(0).unwrap(), [("date", "d0"), ("time", "t0")]);
        assert_eq!(axis.combination(1).unwrap(), [("date", "d0"), ("time", "t1")]);
        assert_eq!(axis.combination(3).unwrap(), [("date", "d1"), ("time", "t0")]);
        assert_eq!(axis.combination(6), None);
    }

    #[test]
    fn index_of_inverts_combination() {
        let axis = date_time_axis();
        for (index, combination) in axis.combinations().enumerate() {
            let found = axis.index_of(|key| {
                combination
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
            });
            assert_eq!(found, Some(index as u64));
        }
        assert_eq!(axis.index_of(|_| Some("d9")), None);
    }

    #[test]
    fn chunk_extents() {
        assert_eq!(Chunking::SingleValue.chunk_extent(6), 1);
        assert_eq!(Chunking::None.chunk_extent(6), 6);
        let selection = Selection::new().with("param", ["a", "b", "c"]);
        let axis = Axis::new(&AxisDefinition::unchunked(["param"]), &selection).unwrap();
        assert_eq!(axis.chunk_extent(), 3);
    }

    #[test]
    fn unknown_key() {
        let selection = Selection::new().with("date", ["d0"]);
        assert_eq!(
            Axis::new(&AxisDefinition::single_value(["step"]), &selection),
            Err(ConfigurationError::UnknownAxisKey { key: "step".into() })
        );
    }

    #[test]
    fn deserialize_definition() {
        let definition: AxisDefinition =
            serde_json::from_str(r#"{"keys": ["param", "levelist"], "chunking": "none"}"#).unwrap();
        assert_eq!(definition, AxisDefinition::unchunked(["param", "levelist"]));
        let definition: AxisDefinition = serde_json::from_str(r#"{"keys": ["step"]}"#).unwrap();
        assert_eq!(definition.chunking, Chunking::SingleValue);
    }
}
