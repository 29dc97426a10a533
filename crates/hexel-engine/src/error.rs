//! Engine error types.

use std::path::PathBuf;

/// Errors from the position store and its backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be opened.
    #[error("failed to open database {path}: {source}")]
    Open {
        /// The database path.
        path: PathBuf,
        /// The underlying sled error.
        source: sled::Error,
    },

    /// The database carries a different type tag than expected.
    #[error("database type mismatch: expected \"{expected}\", found \"{found}\"")]
    TypeMismatch {
        /// The tag this store writes.
        expected: String,
        /// The tag found in the database.
        found: String,
    },

    /// An expected store entry was absent. Indicates a logic error.
    #[error("expected position missing from store")]
    MissingState,

    /// An underlying database operation failed.
    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    /// A record failed to encode or decode.
    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
