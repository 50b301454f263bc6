//! # tonematch Recommend
//!
//! Turns user samples into recommendations from a reference collection.
//!
//! ```text
//! samples ──> FeatureExtractor ──> ModelSet ──> descriptor files
//!                                                    │
//!                                   merge_files / concatenate_datasets
//!                                                    │
//!   global_<type>.db + user_<type>.db ──> RecommendationRun ──> Recommendations
//!                        (Sum, prepare, build_metric, k-NN search)
//! ```
//!
//! In `many` mode each sample type is searched within its own bucket; in
//! `one` mode every bucket is summed first and searched once.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tonematch_recommend::{default_output_name, recommend, DatasetMode, RecommendConfig};
//!
//! let config = RecommendConfig::default()
//!     .with_weights(1.0, 0.5, 2.0)
//!     .with_mode(DatasetMode::One);
//! let found = recommend(&config, Path::new(".")).unwrap();
//! found.write_yaml(default_output_name(&config.weights(), config.dataset_mode)).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod processing;

pub use config::{DatasetMode, RecommendConfig, DEFAULT_SAMPLES_IN_DATASET};
pub use error::{Error, Result};
pub use orchestrator::{find_similar, recommend, RecommendationRun, Stage};
pub use output::{default_output_name, Recommendations};
pub use processing::{
    descriptors_to_datasets, process_samples, samples_to_datasets, ClassificationOutcome, Classifier, ClassifierError, ExtractionError,
    FeatureExtractor, ModelSet, ProcessingReport, AUDIO_EXTENSIONS,
};
