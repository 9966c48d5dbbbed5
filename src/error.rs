use thiserror::Error;

/// Failures surfaced by the activity store. Query parameter problems are
/// reported as [StoreError::InvalidArgument]; anything touching the log file
/// propagates the underlying cause so storage failures are never mistaken for
/// empty results.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("activity log I/O failure")]
    Io(#[from] std::io::Error),
    #[error("failed to encode activity record")]
    Encode(#[from] serde_json::Error),
}
