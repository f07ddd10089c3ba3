//! Error types.

use thiserror::Error;

/// Why [`QueryResult::data`](crate::bridge::QueryResult::data) produced no
/// value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError<E> {
    /// The read must wait for the query to settle.
    #[error("query data is not ready yet")]
    Suspended,

    /// The query failed and the error is escalated to the error boundary.
    #[error("query failed: {0}")]
    Boundary(E),
}

impl<E> DataError<E> {
    pub fn is_suspended(&self) -> bool {
        matches!(self, DataError::Suspended)
    }
}

/// Errors from loading client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid client configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown notifyOnChangeProps keyword `{0}`, expected \"all\" or a list of fields")]
    UnknownNotifyKeyword(String),
}
