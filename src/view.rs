use std::{fmt, sync::Arc};

use bytes::Bytes;
use zarrs::array::{ArrayIndices, ArraySubset};

use crate::{
    error::{AccessError, ConfigurationError},
    extractor::Extractor,
    merge::MergedView,
    part::Part,
    selection::Selection,
};

/// A lazily extracted, chunked N-dimensional array over one or more merged [`Part`]s.
///
/// Each element is one record returned by the [`Extractor`].
#[derive(Clone)]
pub struct ChunkedView {
    merged: MergedView,
    extractor: Arc<dyn Extractor>,
    chunk_shape: ArrayIndices,
    chunk_counts: ArrayIndices,
}

impl fmt::Debug for ChunkedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedView")
            .field("shape", &self.shape())
            .field("chunk_shape", &self.chunk_shape)
            .field("parts", &self.merged.parts().len())
            .field("extension_axis", &self.merged.extension_axis())
            .finish_non_exhaustive()
    }
}

/// Build a view over `parts` merged along `extension_axis`.
///
/// Along each axis the chunk extent is the smallest chunk extent any part declares for it.
/// No extractor calls are made.
///
/// # Errors
/// Returns a [`ConfigurationError`] if the parts cannot be merged.
pub fn build(
    extractor: Arc<dyn Extractor>,
    parts: Vec<Part>,
    extension_axis: Option<usize>,
) -> Result<ChunkedView, ConfigurationError> {
    let merged = MergedView::new(parts, extension_axis)?;
    let chunk_shape: ArrayIndices = (0..merged.ndim())
        .map(|axis| {
            merged
                .parts()
                .iter()
                .map(|part| part.chunk_shape()[axis])
                .min()
                .unwrap_or(1)
        })
        .collect();
    let chunk_counts = std::iter::zip(merged.shape(), &chunk_shape)
        .map(|(&s, &c)| s.div_ceil(c))
        .collect();
    let view = ChunkedView {
        merged,
        extractor,
        chunk_shape,
        chunk_counts,
    };
    log::debug!(
        "built view of shape {:?} with chunk shape {:?} ({} chunks)",
        view.shape(),
        view.chunk_shape(),
        view.num_chunks()
    );
    Ok(view)
}

impl ChunkedView {
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.merged.shape()
    }

    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Number of chunks along each dimension.
    #[must_use]
    pub fn chunk_count_per_dim(&self) -> &[u64] {
        &self.chunk_counts
    }

    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.chunk_counts.iter().product()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.chunk_shape.len()
    }

    #[must_use]
    pub fn merged(&self) -> &MergedView {
        &self.merged
    }

    #[must_use]
    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.extractor
    }

    /// The record at `coord`.
    ///
    /// # Errors
    /// Returns an [`AccessError`] before any extraction if `coord` is invalid, or an
    /// [`ExtractionFailure`](crate::error::ExtractionFailure) if the extractor fails.
    pub fn at(&self, coord: &[u64]) -> crate::Result<Bytes> {
        let (part, local) = self.merged.locate_part(coord)?;
        part.at(self.extractor.as_ref(), &local)
    }

    /// The single-valued selection at `coord`.
    ///
    /// # Errors
    /// Returns an [`AccessError`] if `coord` is invalid.
    pub fn resolve(&self, coord: &[u64]) -> Result<Selection, AccessError> {
        self.merged.resolve(coord)
    }

    /// The unclipped element box of the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns [`AccessError::ChunkOutOfRange`] if the chunk is outside the chunk grid.
    pub fn chunk_box(&self, chunk_indices: &[u64]) -> Result<ArraySubset, AccessError> {
        let in_grid = chunk_indices.len() == self.ndim()
            && std::iter::zip(chunk_indices, &self.chunk_counts).all(|(i, n)| i < n);
        if !in_grid {
            return Err(self.chunk_out_of_range(chunk_indices));
        }
        let ranges: Vec<_> = std::iter::zip(chunk_indices, &self.chunk_shape)
            .map(|(i, c)| i * c..(i + 1) * c)
            .collect();
        Ok(ArraySubset::new_with_ranges(&ranges))
    }

    /// The element box of the chunk at `chunk_indices`, clipped to the array shape.
    ///
    /// # Errors
    /// Returns [`AccessError::ChunkOutOfRange`] if the chunk is outside the chunk grid.
    pub fn chunk_region(&self, chunk_indices: &[u64]) -> Result<ArraySubset, AccessError> {
        self.chunk_box(chunk_indices)?
            .bound(self.shape())
            .map_err(|_| self.chunk_out_of_range(chunk_indices))
    }

    /// Every chunk index of the chunk grid, last dimension fastest.
    pub fn chunk_indices(&self) -> impl Iterator<Item = ArrayIndices> + Send + use<> {
        ArraySubset::new_with_shape(self.chunk_counts.clone())
            .indices()
            .into_iter()
            .map(|indices| indices.to_vec())
    }

    fn chunk_out_of_range(&self, chunk_indices: &[u64]) -> AccessError {
        AccessError::ChunkOutOfRange {
            chunk: chunk_indices.to_vec(),
            grid: self.chunk_counts.clone(),
        }
    }
}
