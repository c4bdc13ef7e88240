use bytes::Bytes;
use zarrs::array::ArrayIndices;

use crate::{
    axis::{Axis, AxisDefinition},
    error::{AccessError, ConfigurationError, ExtractionFailure},
    extractor::{Extractor, ExtractorKind},
    selection::Selection,
};

/// One multi-valued selection laid out along a set of axes.
///
/// Every multi-valued key of the selection is mapped by exactly one axis. Keys with a single
/// value are fixed for every coordinate and only contribute to an axis if it names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    selection: Selection,
    axes: Vec<Axis>,
    kind: ExtractorKind,
}

impl Part {
    /// Expand `selection` and bind it to `axes`.
    ///
    /// # Errors
    /// Returns a [`ConfigurationError`] if a value specification is malformed, an axis is empty
    /// or names an unknown key, a key is mapped twice, or a multi-valued key is left unmapped.
    pub fn new(
        selection: &Selection,
        axes: Vec<AxisDefinition>,
        kind: ExtractorKind,
    ) -> Result<Self, ConfigurationError> {
        let selection = selection.expand()?;

        let mut assigned: Vec<&str> = Vec::new();
        for (axis, definition) in axes.iter().enumerate() {
            if definition.keys.is_empty() {
                return Err(ConfigurationError::EmptyAxis { axis });
            }
            for key in &definition.keys {
                if !selection.contains_key(key) {
                    return Err(ConfigurationError::UnknownAxisKey { key: key.clone() });
                }
                if assigned.contains(&key.as_str()) {
                    return Err(ConfigurationError::DuplicateKeyAssignment { key: key.clone() });
                }
                assigned.push(key);
            }
        }
        if let Some((key, values)) = selection
            .iter()
            .find(|(key, values)| values.len() > 1 && !assigned.contains(key))
        {
            return Err(ConfigurationError::UnassignedKey {
                key: key.to_string(),
                count: values.len(),
            });
        }

        let axes = axes
            .iter()
            .map(|definition| Axis::new(definition, &selection))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            selection,
            axes,
            kind,
        })
    }

    /// Parse `request` and bind it to `axes`.
    ///
    /// # Errors
    /// As [`Selection::from_request`] and [`Part::new`].
    pub fn from_request(
        request: &str,
        axes: Vec<AxisDefinition>,
        kind: ExtractorKind,
    ) -> Result<Self, ConfigurationError> {
        Self::new(&Selection::from_request(request)?, axes, kind)
    }

    /// The expanded selection.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    #[must_use]
    pub fn kind(&self) -> ExtractorKind {
        self.kind
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Local shape: the extent of each axis.
    #[must_use]
    pub fn shape(&self) -> ArrayIndices {
        self.axes.iter().map(Axis::extent).collect()
    }

    #[must_use]
    pub fn chunk_shape(&self) -> ArrayIndices {
        self.axes.iter().map(Axis::chunk_extent).collect()
    }

    /// The single-valued selection at `coord`, keys in the order of the original selection.
    ///
    /// # Errors
    /// Returns an [`AccessError`] if `coord` has the wrong dimensionality or lies outside the
    /// local shape.
    pub fn resolve(&self, coord: &[u64]) -> Result<Selection, AccessError> {
        if coord.len() != self.ndim() {
            return Err(AccessError::DimensionMismatch {
                coord: coord.to_vec(),
                expected: self.ndim(),
                found: coord.len(),
            });
        }
        let out_of_range = || AccessError::CoordinateOutOfRange {
            coord: coord.to_vec(),
            shape: self.shape(),
        };
        let mut fixed: Vec<(&str, &str)> = Vec::new();
        for (axis, &index) in self.axes.iter().zip(coord) {
            fixed.extend(axis.combination(index).ok_or_else(out_of_range)?);
        }

        let mut resolved = Selection::new();
        for (key, values) in self.selection.iter() {
            match fixed.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => resolved.insert(key, [value]),
                None => resolved.insert(key, values),
            }
        }
        Ok(resolved)
    }

    /// The coordinate whose resolved selection agrees with `selection` on every axis key.
    #[must_use]
    pub fn locate(&self, selection: &Selection) -> Option<ArrayIndices> {
        self.axes
            .iter()
            .map(|axis| axis.index_of(|key| selection.value(key)))
            .collect()
    }

    /// Extract the record at `coord`.
    ///
    /// # Errors
    /// Returns an [`AccessError`] without calling `extractor` if `coord` is invalid, or an
    /// [`ExtractionFailure`] if the extractor fails.
    pub fn at(&self, extractor: &dyn Extractor, coord: &[u64]) -> crate::Result<Bytes> {
        let selection = self.resolve(coord)?;
        log::trace!("extracting {selection} ({})", self.kind);
        match extractor.extract(&selection, self.kind) {
            Ok(bytes) => Ok(bytes),
            Err(source) => Err(ExtractionFailure::new(selection, source).into()),
        }
    }
}
