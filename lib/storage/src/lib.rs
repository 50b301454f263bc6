//! # tonematch Storage
//!
//! On-disk formats for tonematch:
//!
//! - [`dataset_file`] - checksummed, compressed dataset files written atomically
//! - [`codec`] - per-sample descriptor documents (YAML or JSON) flattened to dot paths
//! - [`shards`] - bucketing descriptor files by sample type into bounded dataset shards
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tonematch_storage::{concatenate_datasets, load_dataset, merge_files};
//!
//! let report = merge_files(Path::new("descriptors"), Path::new("parts"), "user", 5000).unwrap();
//! println!("{} shards written", report.shards.len());
//!
//! concatenate_datasets(Path::new("parts/vocal"), Path::new("user_dataset_vocal.db")).unwrap();
//! let vocal = load_dataset("user_dataset_vocal.db").unwrap();
//! println!("{} vocal samples", vocal.len());
//! ```

pub mod codec;
pub mod dataset_file;
pub mod error;
pub mod shards;

pub use codec::{is_descriptor_file, read_descriptors, read_sample, write_descriptors, DESCRIPTOR_EXTENSIONS};
pub use dataset_file::{load_dataset, save_dataset};
pub use error::{Error, Result};
pub use shards::{
    concatenate_datasets, dataset_files, descriptor_files, merge_files, recreate_dirs, shard_path, ShardReport,
    DATASET_EXTENSION,
};
