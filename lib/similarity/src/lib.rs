//! # tonematch Similarity
//!
//! Composite distance metrics and exact k-NN retrieval over prepared datasets.
//!
//! ## Features
//!
//! - **Group metrics**: Euclidean, symmetric Kullback-Leibler between Gaussians, weighted Pearson
//! - **Composition**: exponential compression and weighted linear combination
//! - **Metric builder**: the three-group recommender metric from a layout and weights
//! - **Search**: parallel exact scan with deterministic ordering and exclusion sets
//!
//! ## Example
//!
//! ```rust
//! use tonematch_core::{DataSet, Descriptors, Value};
//! use tonematch_similarity::{build_metric, find_similar_in, MetricConfig, MetricWeights};
//!
//! let dataset = DataSet::from_descriptors(
//!     "demo",
//!     (0..5).map(|i| {
//!         let mut d = Descriptors::new();
//!         d.insert("pca".to_string(), Value::Real(vec![i as f32, 0.0]));
//!         (format!("p{}", i), d)
//!     }),
//! )
//! .unwrap();
//!
//! // low-level only: the other groups are left out of the combination
//! let config = MetricConfig::default().with_weights(MetricWeights::new(1.0, 0.0, 0.0));
//! let metric = build_metric(dataset.layout(), &config).unwrap();
//!
//! let found = find_similar_in(&dataset, &metric, &["p0"], 2, "metadata.tags.file_name").unwrap();
//! assert_eq!(found["p0"], vec!["p1", "p2"]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │   Layout    │────>│  Metric Builder  │────>│ Linear      │
//! │  + weights  │     │ (group metrics)  │     │ Combination │
//! └─────────────┘     └──────────────────┘     └─────────────┘
//!                                                     │
//!                     ┌──────────────────┐            │
//!                     │   k-NN search    │<───────────┘
//!                     │ (exclude, order) │
//!                     └──────────────────┘
//! ```

pub mod builder;
pub mod metric;
pub mod search;

pub use builder::{
    build_metric, highlevel_weights, MetricConfig, MetricWeights, DEFAULT_COMPRESSION_ALPHA,
    HIGHLEVEL_LABEL, LOWLEVEL_LABEL, TIMBRE_LABEL,
};
pub use metric::{
    DistanceFunction, Euclidean, ExponentialCompress, KullbackLeibler, LinearCombination, Term,
    WeightedPearson,
};
pub use search::{find_similar_in, nn_search, Neighbor, DEFAULT_QUANTITY};
