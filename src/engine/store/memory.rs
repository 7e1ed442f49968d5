use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::engine::event::SensorEvent;
use crate::engine::store::{EventScan, EventStore, StoreError};
use crate::protocol::ScanRequest;

const LOG_TARGET: &str = "pulse::engine::store::memory";

/// Events of one sensor keyed by (epoch millis, insertion sequence), which is
/// the natural scan order.
type SensorIndex = BTreeMap<(i64, u64), SensorEvent>;

#[derive(Default)]
struct Inner {
    sensors: RwLock<HashMap<String, SensorIndex>>,
    sequence: AtomicU64,
    offline: AtomicBool,
}

/// In-memory event store.
///
/// A scan owns its own cursor and re-reads the index one event at a time, so
/// concurrent scans never share state and no lock is held between events.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: SensorEvent) {
        let seq = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        let key = (event.timestamp.timestamp_millis(), seq);
        self.inner
            .sensors
            .write()
            .entry(event.sensor_id.clone())
            .or_default()
            .insert(key, event);
    }

    pub fn extend(&self, events: impl IntoIterator<Item = SensorEvent>) {
        for event in events {
            self.insert(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.sensors.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the store offline: new scans are refused and running scans fail
    /// at their next read.
    pub fn set_available(&self, available: bool) {
        self.inner.offline.store(!available, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        !self.inner.offline.load(Ordering::Acquire)
    }

    /// Loads newline-delimited `SensorEvent` documents. Blank lines are skipped.
    pub async fn load_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;

        let mut loaded = 0;
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event: SensorEvent = serde_json::from_str(line).map_err(|e| {
                StoreError::Seed(format!("{}:{}: {e}", path.display(), lineno + 1))
            })?;
            self.insert(event);
            loaded += 1;
        }
        info!(target: LOG_TARGET, path = %path.display(), loaded, "Seeded memory store");
        Ok(loaded)
    }

    fn next_after(
        &self,
        sensor_id: &str,
        lower: Bound<(i64, u64)>,
        upper: (i64, u64),
    ) -> Option<((i64, u64), SensorEvent)> {
        let sensors = self.inner.sensors.read();
        sensors
            .get(sensor_id)?
            .range((lower, Bound::Included(upper)))
            .next()
            .map(|(key, event)| (*key, event.clone()))
    }
}

struct Cursor {
    store: MemoryStore,
    sensor_id: String,
    lower: Bound<(i64, u64)>,
    upper: (i64, u64),
    done: bool,
}

#[async_trait]
impl EventStore for MemoryStore {
    type Event = SensorEvent;

    async fn open_scan(&self, request: &ScanRequest) -> Result<EventScan<SensorEvent>, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }

        let cursor = Cursor {
            store: self.clone(),
            sensor_id: request.sensor_id.clone(),
            lower: Bound::Included((request.since.timestamp_millis(), 0)),
            upper: (request.until.timestamp_millis(), u64::MAX),
            done: false,
        };

        let scan = futures::stream::unfold(cursor, |mut cursor| async move {
            if cursor.done {
                return None;
            }
            if !cursor.store.is_available() {
                warn!(target: LOG_TARGET, sensor_id = %cursor.sensor_id, "Store went offline during scan");
                cursor.done = true;
                return Some((
                    Err(StoreError::Read("memory store went offline".to_string())),
                    cursor,
                ));
            }
            let (key, event) =
                cursor
                    .store
                    .next_after(&cursor.sensor_id, cursor.lower, cursor.upper)?;
            cursor.lower = Bound::Excluded(key);
            Some((Ok(event), cursor))
        });

        Ok(scan.boxed())
    }
}
