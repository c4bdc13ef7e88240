//! Serializable descriptions of views and stores.
//!
//! ```json
//! {
//!   "arrays": [
//!     {
//!       "name": "surface",
//!       "parts": [
//!         {
//!           "request": "class=ea,date=2020-01-01/to/2020-01-04,time=0/12,param=167/165",
//!           "axes": [{"keys": ["date", "time"]}, {"keys": ["param"], "chunking": "none"}]
//!         }
//!       ],
//!       "data_type": "float32",
//!       "fill_value": -1.0
//!     }
//!   ]
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    axis::AxisDefinition,
    error::ConfigurationError,
    extractor::{Extractor, ExtractorKind},
    metadata::{Attributes, DataType},
    node::{ArrayNode, GroupNode, StoreNode},
    part::Part,
    storage::ViewStore,
    view::{ChunkedView, build},
};

/// One part: a request and the axes its multi-valued keys are laid out along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartConfig {
    pub request: String,
    pub axes: Vec<AxisDefinition>,
    #[serde(default)]
    pub extractor: ExtractorKind,
}

impl PartConfig {
    /// # Errors
    /// As [`Part::from_request`].
    pub fn build(&self) -> Result<Part, ConfigurationError> {
        Part::from_request(&self.request, self.axes.clone(), self.extractor)
    }
}

/// Parts merged into one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub parts: Vec<PartConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_axis: Option<usize>,
}

impl ViewConfig {
    /// # Errors
    /// Returns an error if `json` does not describe a view.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns a [`ConfigurationError`] if a part is invalid or the parts cannot be merged.
    pub fn build(&self, extractor: Arc<dyn Extractor>) -> Result<ChunkedView, ConfigurationError> {
        let parts = self
            .parts
            .iter()
            .map(PartConfig::build)
            .collect::<Result<_, _>>()?;
        build(extractor, parts, self.extension_axis)
    }
}

fn default_fill_value() -> serde_json::Number {
    0.into()
}

/// A view exposed as an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayConfig {
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub view: ViewConfig,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default = "default_fill_value")]
    pub fill_value: serde_json::Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_length: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: Attributes,
}

impl ArrayConfig {
    /// # Errors
    /// Returns an error if the view or the array layout is invalid.
    pub fn build(&self, extractor: Arc<dyn Extractor>) -> crate::Result<ArrayNode> {
        let view = self.view.build(extractor)?;
        ArrayNode::builder(view, self.data_type)
            .name(self.name.clone())
            .fill_value(self.fill_value.clone())
            .record_length(self.record_length)
            .attributes(self.attributes.clone())
            .build()
    }
}

/// A store of one or more arrays.
///
/// A single unnamed array becomes the root array; otherwise the arrays are children of a root
/// group and must be uniquely named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub arrays: Vec<ArrayConfig>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: Attributes,
}

impl StoreConfig {
    /// # Errors
    /// Returns an error if `json` does not describe a store.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build every array over the shared `extractor`.
    ///
    /// # Errors
    /// Returns an error if any array is invalid or array names clash.
    pub fn build(&self, extractor: Arc<dyn Extractor>) -> crate::Result<ViewStore> {
        if let [array] = self.arrays.as_slice()
            && array.name.is_empty()
        {
            return ViewStore::new(array.build(extractor)?);
        }
        let children = self
            .arrays
            .iter()
            .map(|array| array.build(extractor.clone()).map(StoreNode::from))
            .collect::<crate::Result<_>>()?;
        let group = GroupNode::new("", children)?.with_attributes(self.attributes.clone())?;
        ViewStore::new(group)
    }
}
