use crate::processing::{ClassifierError, ExtractionError};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tonematch_core::Error),

    #[error(transparent)]
    Storage(#[from] tonematch_storage::Error),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid profile {path}: {source}")]
    Profile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
