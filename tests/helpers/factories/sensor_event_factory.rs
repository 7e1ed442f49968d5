use crate::engine::SensorEvent;
use crate::shared::time::parse_protocol_timestamp;
use chrono::Duration;
use serde_json::{Value, json};

pub struct SensorEventFactory {
    sensor_id: String,
    start: String,
    step_millis: i64,
    payload: Value,
}

impl SensorEventFactory {
    pub fn new() -> Self {
        Self {
            sensor_id: "sensor-1".to_string(),
            start: "2024-01-01T00:00:00.000+0000".to_string(),
            step_millis: 60_000,
            payload: json!({ "value": 21.5 }),
        }
    }

    pub fn with_sensor(mut self, sensor_id: &str) -> Self {
        self.sensor_id = sensor_id.to_string();
        self
    }

    pub fn starting_at(mut self, timestamp: &str) -> Self {
        self.start = timestamp.to_string();
        self
    }

    pub fn every_millis(mut self, step: i64) -> Self {
        self.step_millis = step;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn create(self) -> SensorEvent {
        self.create_list(1).remove(0)
    }

    /// `count` events spaced `step_millis` apart, each tagged with its
    /// `index` so ordering can be asserted.
    pub fn create_list(self, count: usize) -> Vec<SensorEvent> {
        let start = parse_protocol_timestamp(&self.start).expect("factory timestamp");
        (0..count)
            .map(|i| {
                let mut event = SensorEvent::new(
                    self.sensor_id.clone(),
                    start + Duration::milliseconds(self.step_millis * i as i64),
                );
                if let Some(fields) = self.payload.as_object() {
                    event.payload = fields.clone();
                }
                event.payload.insert("index".into(), json!(i));
                event
            })
            .collect()
    }
}
