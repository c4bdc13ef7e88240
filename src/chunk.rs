use bytes::{Bytes, BytesMut};

use crate::{
    error::ExtractionFailure,
    metadata::DataType,
    view::ChunkedView,
};

/// Byte layout of the record extracted for one view coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub data_type: DataType,
    /// Elements per record; a record is a single element if [`None`].
    pub record_length: Option<u64>,
}

impl RecordLayout {
    #[must_use]
    pub fn elements(&self) -> u64 {
        self.record_length.unwrap_or(1)
    }

    /// Size of one record in bytes.
    #[must_use]
    pub fn record_size(&self) -> u64 {
        self.elements() * self.data_type.size() as u64
    }
}

/// Assemble the encoded bytes of the chunk at `chunk_indices`.
///
/// Records are concatenated in row-major order over the whole chunk box. Coordinates past the
/// edge of the view get `fill_record` and are never extracted.
///
/// # Errors
/// Returns an [`AccessError`](crate::error::AccessError) if the chunk is outside the chunk grid,
/// or an [`ExtractionFailure`] if an extraction fails or returns a record of the wrong size.
pub fn assemble_chunk(
    view: &ChunkedView,
    chunk_indices: &[u64],
    layout: RecordLayout,
    fill_record: &[u8],
) -> crate::Result<Bytes> {
    let chunk_box = view.chunk_box(chunk_indices)?;
    let record_size = layout.record_size();
    log::trace!("assembling chunk {chunk_indices:?} over {chunk_box:?}");

    let capacity = usize::try_from(chunk_box.num_elements() * record_size).unwrap_or(0);
    let mut out = BytesMut::with_capacity(capacity);
    let shape = view.shape();
    for coord in chunk_box.indices() {
        if std::iter::zip(coord.iter(), shape).any(|(c, s)| c >= s) {
            out.extend_from_slice(fill_record);
            continue;
        }
        let record = view.at(&coord)?;
        if record.len() as u64 != record_size {
            let selection = view.resolve(&coord)?;
            return Err(ExtractionFailure::new(
                selection,
                format!(
                    "record is {} bytes, expected {record_size}; all fields in a view must be of equal size",
                    record.len()
                ),
            )
            .into());
        }
        out.extend_from_slice(&record);
    }
    Ok(out.freeze())
}

/// Size in bytes of every encoded chunk of `view`.
#[must_use]
pub fn chunk_size(view: &ChunkedView, layout: RecordLayout) -> u64 {
    view.chunk_shape().iter().product::<u64>() * layout.record_size()
}
