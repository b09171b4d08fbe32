use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the neardup-core library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be opened or decoded
    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// No images were found to process
    #[error("No input images: the file list is empty")]
    EmptyInput,

    /// Directory or file not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Spatial index queried before it was built
    #[error("Spatial index queried before build")]
    IndexNotBuilt,

    /// Position index outside the table range
    #[error("Position index {index} out of range for table of {len} rows")]
    OutOfRange { index: usize, len: usize },

    /// Internal consistency failure between the table, the index and the
    /// neighbor results. Any partial partition would be untrustworthy, so
    /// this aborts the run.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Query image is not present in the fingerprint table
    #[error("Query image not found in table: {0}")]
    QueryNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}
