use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tonematch_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid descriptor file {path}: {reason}")]
    InvalidDescriptors { path: PathBuf, reason: String },

    #[error("Unsupported descriptor file: {0}")]
    UnsupportedFormat(PathBuf),
}

impl Error {
    /// A dataset file that cannot be decoded or whose content is inconsistent
    pub fn corrupt(path: &Path, reason: impl std::fmt::Display) -> Self {
        Error::Core(tonematch_core::Error::CorruptData(format!(
            "{}: {}",
            path.display(),
            reason
        )))
    }

    pub fn invalid_descriptors(path: &Path, reason: impl Into<String>) -> Self {
        Error::InvalidDescriptors {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Core(tonematch_core::Error::CorruptData(_)))
    }
}
