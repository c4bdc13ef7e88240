use zarrs::array::ArrayIndices;

use crate::{
    error::{AccessError, ConfigurationError},
    part::Part,
    selection::Selection,
};

/// Parts concatenated along an extension axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedView {
    parts: Vec<Part>,
    extension_axis: Option<usize>,
    /// Start of each part along the extension axis.
    offsets: Vec<u64>,
    shape: ArrayIndices,
}

impl MergedView {
    /// Merge `parts` along `extension_axis`.
    ///
    /// Parts must agree in dimensionality and in extent on every other axis. Only the number of
    /// values is compared, not the values themselves.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::NoParts`], [`ConfigurationError::MissingExtensionAxis`],
    /// [`ConfigurationError::InvalidExtensionAxis`] or [`ConfigurationError::IncompatibleParts`].
    pub fn new(parts: Vec<Part>, extension_axis: Option<usize>) -> Result<Self, ConfigurationError> {
        let Some(first) = parts.first() else {
            return Err(ConfigurationError::NoParts);
        };
        if parts.len() > 1 && extension_axis.is_none() {
            return Err(ConfigurationError::MissingExtensionAxis { parts: parts.len() });
        }
        let ndim = first.ndim();
        if let Some(axis) = extension_axis
            && axis >= ndim
        {
            return Err(ConfigurationError::InvalidExtensionAxis { axis, ndim });
        }

        let expected = first.shape();
        let mut shape = expected.clone();
        let mut offsets = Vec::with_capacity(parts.len());
        let mut offset = 0;
        for (index, part) in parts.iter().enumerate() {
            let found = part.shape();
            let axis = extension_axis.unwrap_or(0);
            let compatible = found.len() == ndim
                && (0..ndim).all(|i| i == axis || found[i] == expected[i]);
            if !compatible {
                return Err(ConfigurationError::IncompatibleParts {
                    part: index,
                    axis,
                    expected,
                    found,
                });
            }
            offsets.push(offset);
            if let Some(axis) = extension_axis {
                offset += found[axis];
            }
        }
        if let Some(axis) = extension_axis {
            shape[axis] = offset;
        }

        log::debug!(
            "merged {} part(s) along {extension_axis:?} into shape {shape:?}",
            parts.len()
        );
        Ok(Self {
            parts,
            extension_axis,
            offsets,
            shape,
        })
    }

    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    #[must_use]
    pub fn extension_axis(&self) -> Option<usize> {
        self.extension_axis
    }

    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// The part holding `coord` and the coordinate local to that part.
    ///
    /// # Errors
    /// Returns an [`AccessError`] if `coord` has the wrong dimensionality or lies outside the
    /// merged shape.
    pub fn locate_part(&self, coord: &[u64]) -> Result<(&Part, ArrayIndices), AccessError> {
        if coord.len() != self.ndim() {
            return Err(AccessError::DimensionMismatch {
                coord: coord.to_vec(),
                expected: self.ndim(),
                found: coord.len(),
            });
        }
        if std::iter::zip(coord, &self.shape).any(|(c, s)| c >= s) {
            return Err(AccessError::CoordinateOutOfRange {
                coord: coord.to_vec(),
                shape: self.shape.clone(),
            });
        }
        let Some(axis) = self.extension_axis else {
            return Ok((&self.parts[0], coord.to_vec()));
        };
        // last part starting at or before the coordinate
        let index = self.offsets.partition_point(|&o| o <= coord[axis]) - 1;
        let mut local = coord.to_vec();
        local[axis] -= self.offsets[index];
        Ok((&self.parts[index], local))
    }

    /// The single-valued selection at `coord`.
    ///
    /// # Errors
    /// See [`MergedView::locate_part`].
    pub fn resolve(&self, coord: &[u64]) -> Result<Selection, AccessError> {
        let (part, local) = self.locate_part(coord)?;
        part.resolve(&local)
    }
}
