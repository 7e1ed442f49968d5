use std::num::NonZeroUsize;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::protocol::errors::QueryError;
use crate::shared::time::{format_protocol_timestamp, parse_protocol_timestamp};

/// A time-ranged scan of one sensor, as the caller states it.
///
/// Field names follow the wire document (`sinceTimestamp`, `batchSize`, ..).
/// `batch_size` is signed so that a non-positive size coming off the wire is
/// reported as an invalid argument rather than a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub since_timestamp: String,
    pub until_timestamp: String,
    pub sensor_id: String,
    pub batch_size: i64,
    pub channel_handle: String,
}

impl QueryRequest {
    pub fn new(
        since_timestamp: impl Into<String>,
        until_timestamp: impl Into<String>,
        sensor_id: impl Into<String>,
        batch_size: i64,
        channel_handle: impl Into<String>,
    ) -> Self {
        Self {
            since_timestamp: since_timestamp.into(),
            until_timestamp: until_timestamp.into(),
            sensor_id: sensor_id.into(),
            batch_size,
            channel_handle: channel_handle.into(),
        }
    }

    /// Checks every precondition that can be checked without the engine.
    pub fn validate(&self) -> Result<ScanRequest, QueryError> {
        let since = parse_protocol_timestamp(&self.since_timestamp)
            .map_err(|e| QueryError::InvalidArgument(format!("sinceTimestamp: {e}")))?;
        let until = parse_protocol_timestamp(&self.until_timestamp)
            .map_err(|e| QueryError::InvalidArgument(format!("untilTimestamp: {e}")))?;
        if until < since {
            return Err(QueryError::InvalidArgument(format!(
                "untilTimestamp {} is before sinceTimestamp {}",
                self.until_timestamp, self.since_timestamp
            )));
        }

        let batch_size = usize::try_from(self.batch_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                QueryError::InvalidArgument(format!(
                    "batchSize must be at least 1, got {}",
                    self.batch_size
                ))
            })?;

        if self.sensor_id.trim().is_empty() {
            return Err(QueryError::InvalidArgument(
                "sensorId must not be empty".to_string(),
            ));
        }
        if self.channel_handle.trim().is_empty() {
            return Err(QueryError::InvalidArgument(
                "channelHandle must not be empty".to_string(),
            ));
        }

        Ok(ScanRequest {
            since,
            until,
            sensor_id: self.sensor_id.clone(),
            batch_size,
            channel_handle: self.channel_handle.clone(),
        })
    }
}

/// A validated request as the engine consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub since: DateTime<FixedOffset>,
    pub until: DateTime<FixedOffset>,
    pub sensor_id: String,
    pub batch_size: NonZeroUsize,
    pub channel_handle: String,
}

impl ScanRequest {
    /// Whether an instant lies inside the requested range. Both bounds are
    /// inclusive.
    pub fn covers(&self, ts: &DateTime<FixedOffset>) -> bool {
        *ts >= self.since && *ts <= self.until
    }

    pub fn to_wire(&self) -> QueryRequest {
        QueryRequest {
            since_timestamp: format_protocol_timestamp(&self.since),
            until_timestamp: format_protocol_timestamp(&self.until),
            sensor_id: self.sensor_id.clone(),
            batch_size: self.batch_size.get() as i64,
            channel_handle: self.channel_handle.clone(),
        }
    }
}
