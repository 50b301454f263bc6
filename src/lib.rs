//! # tonematch
//!
//! An audio sample recommender: for every sample a user supplies, find the
//! closest samples of a reference collection under a weighted composite
//! metric over low-level, timbre and high-level descriptors.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! cargo install tonematch
//! tonematch descriptors/ --weights 1 1 1 --one --print
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use tonematch::prelude::*;
//!
//! let sample = |name: &str, x: f32| {
//!     let mut d = Descriptors::new();
//!     d.insert(FILENAME_DESCRIPTOR.to_string(), Value::from(format!("{}.wav", name)));
//!     d.insert("lowlevel.loudness".to_string(), Value::scalar(x));
//!     d.insert("lowlevel.centroid".to_string(), Value::scalar(x * x));
//!     (name.to_string(), d)
//! };
//! let global = DataSet::from_descriptors("global", vec![sample("g1", 1.0), sample("g2", 5.0)]).unwrap();
//! let user = DataSet::from_descriptors("user", vec![sample("u1", 1.2)]).unwrap();
//!
//! // low-level only: no timbre or high-level descriptors in this collection
//! let config = RecommendConfig::default().with_weights(1.0, 0.0, 0.0);
//! let found = find_similar(global, user, &config).unwrap();
//! assert_eq!(found.get("u1.wav").unwrap()[0], "g1.wav");
//! ```
//!
//! ## Crate Structure
//!
//! tonematch is composed of several crates:
//!
//! - `tonematch-core` - data model (Descriptor, Layout, Point, DataSet) and merge operators
//! - `tonematch-transform` - preparation pipeline (enumerate, clean, normalize, PCA)
//! - `tonematch-similarity` - composite metrics and exact k-NN search
//! - `tonematch-storage` - dataset files, descriptor codec, shards
//! - `tonematch-recommend` - recommendation runs, configuration, sample processing

// Re-export core types
pub use tonematch_core::{
    merge, DataSet, Descriptor, DescriptorType, Descriptors, Error, Layout, Point, Result, SampleType, Value,
    FILENAME_DESCRIPTOR, MD5_DESCRIPTOR, SAMPLE_TYPES, TYPE_DESCRIPTOR,
};

// Re-export pipeline
pub use tonematch_transform::{prepare, Codebook, PipelineConfig};

// Re-export similarity
pub use tonematch_similarity::{
    build_metric, find_similar_in, nn_search, DistanceFunction, LinearCombination, MetricConfig, MetricWeights,
    Neighbor,
};

// Re-export storage
pub use tonematch_storage::{concatenate_datasets, load_dataset, merge_files, read_descriptors, save_dataset};

// Re-export recommendation
pub use tonematch_recommend::{
    default_output_name, find_similar, recommend, DatasetMode, RecommendConfig, Recommendations,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use tonematch_core::{
        merge, DataSet, Descriptors, Layout, Point, SampleType, Value, FILENAME_DESCRIPTOR, TYPE_DESCRIPTOR,
    };
    pub use tonematch_recommend::{find_similar, recommend, DatasetMode, RecommendConfig, Recommendations};
    pub use tonematch_similarity::{build_metric, DistanceFunction, MetricConfig, MetricWeights};
    pub use tonematch_storage::{load_dataset, save_dataset};
    pub use tonematch_transform::{prepare, PipelineConfig};
}
