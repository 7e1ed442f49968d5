use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to a caller of the query protocol.
///
/// The three variants cover disjoint phases: before dispatch, before the scan
/// starts, and while the scan is running.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dispatch failed: {0}")]
    DispatchFailure(DispatchCause),

    #[error("query aborted during scan: {0}")]
    AbortedDuringScan(String),
}

/// Why the engine did not start a scan.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchCause {
    #[error("engine overloaded")]
    Overloaded,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("channel handle '{0}' is already active")]
    HandleInUse(String),

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),
}
