use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{FieldMap, SessionBackend, SessionError};

struct Entry {
    fields: FieldMap,
    expires_at: Instant,
}

/// In-process session backend with the same expiry rules as Redis.
/// Used when no Redis URL is configured.
#[derive(Default)]
pub struct MemorySessionBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instant at which the entry for `key` expires, if it is still live.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        purge_if_expired(&mut entries, key);
        entries.get(key).map(|entry| entry.expires_at)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.values().filter(|e| e.expires_at > now).count()
    }
}

fn purge_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
    let expired = entries
        .get(key)
        .is_some_and(|entry| entry.expires_at <= Instant::now());
    if expired {
        entries.remove(key);
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        purge_if_expired(&mut entries, key);
        Ok(entries.contains_key(key))
    }

    async fn fetch(&self, key: &str) -> Result<FieldMap, SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        purge_if_expired(&mut entries, key);
        Ok(entries
            .get(key)
            .map(|entry| entry.fields.clone())
            .unwrap_or_default())
    }

    async fn store(&self, key: &str, fields: &FieldMap, ttl_secs: u64) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        let expires_at = now + Duration::from_secs(ttl_secs);
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            fields: FieldMap::new(),
            expires_at,
        });
        entry
            .fields
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        entry.expires_at = expires_at;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}
