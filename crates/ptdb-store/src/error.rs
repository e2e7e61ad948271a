use std::io;
use std::path::PathBuf;

use ptdb_types::PathError;

/// Errors from database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Another handle in this process already holds the backing file.
    #[error("database is already open: {}", path.display())]
    AlreadyOpen { path: PathBuf },

    /// The operation needs a loaded document (before `load` or after `close`).
    #[error("database has not been loaded")]
    NotLoaded,

    /// The backing file has content that does not decode as a document.
    #[error("database file appears to be corrupted: {}", path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The backing file exists but could not be read.
    #[error("could not read {}", path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the serialised document to disk failed.
    #[error("could not open {} for writing", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An intermediate path segment holds something other than a mapping.
    #[error("{segment} of {path} is not an object, cannot go further")]
    NotTraversable { segment: String, path: String },

    /// The path string is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// An array operation targeted a value that is not an array.
    #[error("{path} is not an array")]
    NotArray { path: String },

    /// The document could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
