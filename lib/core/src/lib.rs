//! # tonematch Core
//!
//! Core library for the tonematch sample recommender.
//!
//! This crate provides the data model and the schema-aware operators on it:
//!
//! - [`Descriptor`] / [`Value`] - named, typed sample attributes
//! - [`Layout`] - the ordered descriptor set shared by a dataset
//! - [`Point`] - one sample's values plus its identifier
//! - [`DataSet`] - a homogeneous collection of points
//! - [`merge`] - append, column merge and schema-intersection sum
//!
//! ## Example
//!
//! ```rust
//! use tonematch_core::{merge, DataSet, Descriptors, Value};
//!
//! let sample = |mfcc: Vec<f32>| {
//!     let mut d = Descriptors::new();
//!     d.insert("lowlevel.mfcc.mean".to_string(), Value::Real(mfcc));
//!     d.insert("highlevel.type.value".to_string(), Value::from("vocal"));
//!     d
//! };
//!
//! let user = DataSet::from_descriptors("user", vec![("p1".to_string(), sample(vec![1.0, 0.0]))]).unwrap();
//! let global = DataSet::from_descriptors(
//!     "global",
//!     vec![
//!         ("p1".to_string(), sample(vec![9.0, 9.0])),
//!         ("p2".to_string(), sample(vec![1.0, 0.0])),
//!     ],
//! )
//! .unwrap();
//!
//! // the first operand wins on shared identifiers
//! let all = merge::sum(user, global).unwrap();
//! assert_eq!(all.len(), 2);
//! assert_eq!(all.value("p1", "lowlevel.mfcc.mean"), Some(&Value::Real(vec![1.0, 0.0])));
//! ```

pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod merge;
pub mod point;
pub mod sample_type;

pub use dataset::DataSet;
pub use descriptor::{
    Descriptor, DescriptorKind, DescriptorPattern, DescriptorType, Descriptors, Value,
    FILENAME_DESCRIPTOR, MD5_DESCRIPTOR, TYPE_DESCRIPTOR,
};
pub use error::{Error, Result};
pub use layout::Layout;
pub use point::Point;
pub use sample_type::{SampleType, SAMPLE_TYPES};
