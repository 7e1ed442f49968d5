use serde::{Deserialize, Serialize};

use crate::protocol::errors::{DispatchCause, QueryError};

/// Start-acknowledgment of a query. Resolved exactly once per invocation and
/// says nothing about how the batch stream will end.
///
/// On the wire: `{"ack":"started"}` or `{"ack":"failed","cause":{..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ack", content = "cause", rename_all = "lowercase")]
pub enum AckResult {
    Started,
    Failed(DispatchCause),
}

impl AckResult {
    pub fn is_started(&self) -> bool {
        matches!(self, AckResult::Started)
    }

    pub fn into_result(self) -> Result<(), QueryError> {
        match self {
            AckResult::Started => Ok(()),
            AckResult::Failed(cause) => Err(QueryError::DispatchFailure(cause)),
        }
    }
}
