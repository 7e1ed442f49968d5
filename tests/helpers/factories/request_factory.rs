use crate::protocol::QueryRequest;

pub struct RequestFactory {
    request: QueryRequest,
}

impl RequestFactory {
    pub fn new() -> Self {
        Self {
            request: QueryRequest::new(
                "2024-01-01T00:00:00.000+0000",
                "2024-01-02T00:00:00.000+0000",
                "sensor-1",
                2,
                "pulse.test.handle",
            ),
        }
    }

    pub fn with_since(mut self, since: &str) -> Self {
        self.request.since_timestamp = since.to_string();
        self
    }

    pub fn with_until(mut self, until: &str) -> Self {
        self.request.until_timestamp = until.to_string();
        self
    }

    pub fn with_sensor(mut self, sensor_id: &str) -> Self {
        self.request.sensor_id = sensor_id.to_string();
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.request.batch_size = batch_size;
        self
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.request.channel_handle = handle.to_string();
        self
    }

    pub fn create(self) -> QueryRequest {
        self.request
    }
}
