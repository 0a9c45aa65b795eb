//! Error types for fedtask.

use std::path::PathBuf;

/// Result type alias for fedtask operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or reading federated tasks.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// The path where the error occurred, if known.
        path: Option<PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Arrow error while loading a tabular backing dataset.
    #[cfg(feature = "table")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error while loading a tabular backing dataset.
    #[cfg(feature = "table")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Invalid skew specification or generator configuration.
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The dataset lacks a field the requested partitioning needs.
    #[error("Unsupported dataset: {message}")]
    UnsupportedDataset {
        /// Description of the missing capability.
        message: String,
    },

    /// A task with the same composite key already exists on disk.
    #[error("Task already exists at {path:?}")]
    TaskAlreadyExists {
        /// Directory of the existing task.
        path: PathBuf,
    },

    /// Saving a task failed; the task directory has been rolled back.
    #[error("Failed to persist task at {path:?}: {message}")]
    Persistence {
        /// Directory of the task being written.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The backing dataset of an index-mode task could not be built.
    #[error("Cannot resolve dataset: {message}")]
    DatasetResolution {
        /// Description of the resolution failure.
        message: String,
    },

    /// A task record is missing fields or is internally inconsistent.
    #[error("Malformed task record: {message}")]
    MalformedRecord {
        /// Description of the defect.
        message: String,
    },

    /// Index out of bounds when accessing a dataset.
    #[error("Index {index} out of bounds for dataset with {len} rows")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The actual length of the dataset.
        len: usize,
    },

    /// Parallel arrays of a dataset disagree in length.
    #[error("Length mismatch: {left} features vs {right} {what}")]
    LengthMismatch {
        /// Which parallel array disagrees with the features.
        what: &'static str,
        /// Number of feature rows.
        left: usize,
        /// Length of the other array.
        right: usize,
    },
}

impl Error {
    /// Create an I/O error with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported dataset error.
    pub fn unsupported_dataset(message: impl Into<String>) -> Self {
        Self::UnsupportedDataset {
            message: message.into(),
        }
    }

    /// Create a persistence error for the task at `path`.
    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a dataset resolution error.
    pub fn dataset_resolution(message: impl Into<String>) -> Self {
        Self::DatasetResolution {
            message: message.into(),
        }
    }

    /// Create a malformed record error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
        }
    }
}
