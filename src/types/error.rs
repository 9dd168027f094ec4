//! Error types shared by the journal collaborators and the query pipelines

/// Result type for journal collaborator operations
pub type JournalResult<T> = Result<T, JournalError>;

/// Result type for query operations and query stream items
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised by a storage collaborator
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The initial scan position could not be established
    #[error("cursor unavailable: {0}")]
    CursorUnavailable(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors surfaced to query callers
///
/// Validation failures are returned synchronously from the query methods.
/// Everything else arrives as an `Err` item on the stream, after which the
/// stream ends; a normal end of stream is always `None`, never an error.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("persistence id must not be blank")]
    InvalidPersistenceId,

    #[error("historical query failed: {0}")]
    Journal(#[from] JournalError),

    #[error("live feed failed: {0}")]
    LiveFeed(String),
}
