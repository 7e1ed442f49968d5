use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted sensor reading.
///
/// Serialized flat: `{"SID": .., "timestamp": "..", <payload fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    #[serde(rename = "SID")]
    pub sensor_id: String,
    #[serde(with = "crate::shared::time::protocol_format")]
    pub timestamp: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl SensorEvent {
    pub fn new(sensor_id: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            timestamp,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}
