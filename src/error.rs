//! Error types for pcapql.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for pcapql operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Query text did not compile
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error reading or writing an index database
    #[error("Index store error: {0}")]
    Store(#[from] StoreError),

    /// Error reading a capture segment
    #[error(transparent)]
    Core(#[from] pcapql_core::Error),

    /// Worker pool could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A grammar violation, reported at the offending token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column} (near '{token}')")]
pub struct ParseError {
    pub message: String,
    /// Text of the offending token
    pub token: String,
    pub line: u32,
    pub column: u32,
}

/// Errors related to the SQLite index stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No index has been built for a segment
    #[error("No index for segment {segment} at {}", path.display())]
    MissingIndex { segment: u32, path: PathBuf },

    /// The master index does not exist yet
    #[error("Master index not found at {}", path.display())]
    MissingMaster { path: PathBuf },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
