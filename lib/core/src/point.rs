use crate::descriptor::{Descriptors, Value};
use crate::layout::Layout;
use serde::{Deserialize, Serialize};

/// One sample inside a dataset: an identifier plus one value per layout descriptor
///
/// Values are stored in layout order, so a point is only meaningful together
/// with the layout of the dataset that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub values: Vec<Value>,
}

impl Point {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look a value up by descriptor name
    #[inline]
    pub fn value<'a>(&'a self, layout: &Layout, name: &str) -> Option<&'a Value> {
        layout.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Numeric value of a descriptor, if it exists and is real
    #[inline]
    pub fn real<'a>(&'a self, layout: &Layout, name: &str) -> Option<&'a [f32]> {
        self.value(layout, name).and_then(Value::as_real)
    }

    /// Convert back into a standalone descriptor mapping
    pub fn to_descriptors(&self, layout: &Layout) -> Descriptors {
        layout
            .names()
            .zip(self.values.iter())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }
}
