//! # tonematch Transform
//!
//! Dataset transformation stages. Every stage consumes a [`DataSet`] and
//! returns a new one, errors use [`tonematch_core::Error`].
//!
//! - [`length`] - drop variable-length descriptors, coerce ragged ones to a fixed length
//! - [`enumerate`] - map string descriptors onto integer codes through a [`Codebook`]
//! - [`cleaner`] - drop constant and degenerate descriptors
//! - [`normalize`] - min-max or z-score rescaling
//! - [`pca`] - principal component reduction
//! - [`pipeline`] - the default composition of the above
//!
//! ## Example
//!
//! ```rust
//! use tonematch_core::{DataSet, Descriptors, Value};
//! use tonematch_transform::{prepare, PipelineConfig};
//!
//! let samples = (0..4).map(|i| {
//!     let mut d = Descriptors::new();
//!     d.insert("metadata.tags.file_name".to_string(), Value::from(format!("{}.wav", i)));
//!     d.insert("lowlevel.loudness".to_string(), Value::scalar(i as f32));
//!     d.insert("lowlevel.centroid".to_string(), Value::scalar((i * i) as f32));
//!     (format!("p{}", i), d)
//! });
//! let dataset = DataSet::from_descriptors("demo", samples).unwrap();
//!
//! let prepared = prepare(dataset, &PipelineConfig::default().with_pca_dimension(1)).unwrap();
//! assert!(prepared.layout().contains("pca"));
//! assert!(!prepared.layout().contains("lowlevel.loudness"));
//! ```
//!
//! [`DataSet`]: tonematch_core::DataSet

pub mod cleaner;
pub mod enumerate;
pub mod length;
pub mod normalize;
pub mod pca;
pub mod pipeline;

pub use cleaner::clean;
pub use enumerate::{enumerate, enumerate_with, Codebook};
pub use length::{fix_length, remove_variable_length};
pub use normalize::{normalize, NormalizeConfig, Normalization};
pub use pca::{pca, PcaConfig, PcaModel, DEFAULT_PCA_DIMENSION, PCA_DESCRIPTOR};
pub use pipeline::{prepare, PipelineConfig};
