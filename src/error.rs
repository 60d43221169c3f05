//! Error types for IPL building, lookup and persistence.

use thiserror::Error;

/// Result type for IPL operations
pub type Result<T> = std::result::Result<T, IplError>;

/// Errors surfaced by the IPL model, builder and store
#[derive(Error, Debug)]
pub enum IplError {
    /// A software enumerator was unreachable or returned malformed data
    #[error("enumeration failed: {0}")]
    Enumeration(String),

    /// No persisted snapshot matches the request
    #[error("snapshot not found: {0}")]
    NotFound(String),

    /// Closest-match search relaxed down to its floor without a hit
    #[error("no program name close to {query:?} above cutoff {floor}")]
    AmbiguousMatch { query: String, floor: f64 },

    /// SQLite error from the snapshot store
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Snapshot blob could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
