use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{EventRelay, RelayError};

struct Record {
    payload: Vec<u8>,
    visible_at: Instant,
}

/// Uncommitted records of one topic, oldest first
#[derive(Default)]
struct Log {
    records: Vec<Record>,
}

/// Single-partition in-process broker with one consumer group.
///
/// A record becomes readable `replication_delay` after it is produced.
/// `consume` waits out the poll window, then hands back the readable prefix
/// and commits it by dropping those records from the log.
pub struct MemoryRelay {
    logs: Mutex<HashMap<String, Log>>,
    poll_window: Duration,
    replication_delay: Duration,
}

impl MemoryRelay {
    pub fn new(poll_window: Duration) -> Self {
        Self::with_replication_delay(poll_window, Duration::ZERO)
    }

    pub fn with_replication_delay(poll_window: Duration, replication_delay: Duration) -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
            poll_window,
            replication_delay,
        }
    }

    /// Records produced to `topic` that the group has not committed yet.
    pub fn lag(&self, topic: &str) -> usize {
        let logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        logs.get(topic)
            .map(|log| log.records.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventRelay for MemoryRelay {
    async fn produce(&self, topic: &str, value: &Value) -> Result<(), RelayError> {
        let payload = serde_json::to_vec(value)?;
        let mut logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        logs.entry(topic.to_string()).or_default().records.push(Record {
            payload,
            visible_at: Instant::now() + self.replication_delay,
        });
        Ok(())
    }

    async fn consume(&self, topic: &str) -> Result<Vec<Value>, RelayError> {
        tokio::time::sleep(self.poll_window).await;

        let now = Instant::now();
        let mut logs = self.logs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(log) = logs.get_mut(topic) else {
            return Ok(Vec::new());
        };

        let readable = log
            .records
            .iter()
            .take_while(|record| record.visible_at <= now)
            .map(|record| serde_json::from_slice(&record.payload))
            .collect::<Result<Vec<Value>, _>>()?;
        // Commit: the group never sees these again.
        log.records.drain(..readable.len());

        debug!("Consumed {} event(s) from '{}'", readable.len(), topic);
        Ok(readable)
    }
}
