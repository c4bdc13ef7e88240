//! Read-only Zarr V3 stores over chunked views of multi-valued field selections.
//!
//! A [`Part`](part::Part) lays the values of a [`Selection`](selection::Selection) out along
//! user-defined axes; parts are merged along an extension axis into a
//! [`ChunkedView`](view::ChunkedView) whose elements are produced on demand by an
//! [`Extractor`](extractor::Extractor). A [`ViewStore`](storage::ViewStore) exposes views as Zarr
//! V3 arrays through the `zarrs` storage traits.
pub mod axis;
pub mod chunk;
pub mod chunk_key_encoding;
pub mod config;
mod error;
pub mod extractor;
pub mod merge;
pub mod metadata;
pub mod node;
pub mod part;
pub mod selection;
pub mod storage;
pub mod view;

pub use zarrs;

pub use error::{AccessError, BoxError, ConfigurationError, Error, ExtractionFailure, Result};
