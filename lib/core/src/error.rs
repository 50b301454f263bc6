use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Corrupt dataset: {0}")]
    CorruptData(String),

    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("Duplicate point: {0}")]
    DuplicatePoint(String),

    #[error("Descriptors present in both datasets: {}", .0.join(", "))]
    SchemaOverlap(Vec<String>),

    #[error("Layouts differ: {0}")]
    LayoutMismatch(String),

    #[error("Datasets do not contain the same points: {0}")]
    PointSetMismatch(String),

    #[error("Point not found: {0}")]
    PointNotFound(String),

    #[error("Point {id} does not match the dataset layout: {reason}")]
    InconsistentPoint { id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
