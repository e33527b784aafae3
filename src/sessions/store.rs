use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{FieldMap, SessionBackend, SessionError, SESSION_DATA_FIELD, SESSION_KEY_FIELD};

/// Session field holding a per-session expiry override, in seconds
pub const EXPIRY_FIELD: &str = "_session_expiry";

/// One client session bound to a backend.
///
/// Data is loaded lazily on first access. Every `save` rewrites the entry and
/// resets its time to live, so the expiry window slides forward with each
/// write. Expired sessions vanish from the backend on their own; there is no
/// sweep.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    session_key: Option<String>,
    cache: Option<FieldMap>,
    default_expiry: u64,
    modified: bool,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, session_key: Option<String>, default_expiry: u64) -> Self {
        Self {
            backend,
            session_key: session_key.filter(|k| !k.is_empty()),
            cache: None,
            default_expiry,
            modified: false,
        }
    }

    pub fn session_key(&self) -> Option<&str> {
        self.session_key.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// True when no data is loaded or the loaded data is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.as_ref().map_or(true, |data| data.is_empty())
    }

    /// True iff the backend holds a live entry for `key`.
    pub async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        self.backend.exists(key).await
    }

    /// All session fields stored under `key`; empty when absent or expired.
    pub async fn load(&self, key: &str) -> Result<FieldMap, SessionError> {
        let raw = self.backend.fetch(key).await?;
        match raw.get(SESSION_DATA_FIELD) {
            Some(blob) => Ok(serde_json::from_str(blob)?),
            None => Ok(FieldMap::new()),
        }
    }

    /// Allocate a fresh unused key and persist the current data under it.
    pub async fn create(&mut self) -> Result<String, SessionError> {
        let key = self.new_session_key().await?;
        self.persist(&key, true).await?;
        self.session_key = Some(key.clone());
        self.modified = true;
        info!("Created session {}", key);
        Ok(key)
    }

    /// Persist the session and reset the entry's time to live.
    ///
    /// With no key assigned this allocates one through `create`. With
    /// `must_create` the cached data is written without loading from the
    /// backend first.
    pub async fn save(&mut self, must_create: bool) -> Result<(), SessionError> {
        if !must_create {
            // Loading may drop a key the backend does not know.
            self.data().await?;
        }
        match self.session_key.clone() {
            None => self.create().await.map(|_| ()),
            Some(key) => self.persist(&key, must_create).await,
        }
    }

    /// Remove the entry for `key`, or for this session's key when `None`.
    /// A no-op when neither resolves.
    pub async fn delete(&mut self, key: Option<&str>) -> Result<(), SessionError> {
        let key = match key.or(self.session_key.as_deref()) {
            Some(key) => key.to_string(),
            None => return Ok(()),
        };
        self.backend.remove(&key).await
    }

    pub async fn get(&mut self, name: &str) -> Result<Option<String>, SessionError> {
        Ok(self.data().await?.get(name).cloned())
    }

    pub async fn contains(&mut self, name: &str) -> Result<bool, SessionError> {
        Ok(self.data().await?.contains_key(name))
    }

    pub async fn insert(&mut self, name: &str, value: impl Into<String>) -> Result<(), SessionError> {
        self.data().await?.insert(name.to_string(), value.into());
        self.modified = true;
        Ok(())
    }

    pub async fn remove(&mut self, name: &str) -> Result<Option<String>, SessionError> {
        let removed = self.data().await?.remove(name);
        if removed.is_some() {
            self.modified = true;
        }
        Ok(removed)
    }

    /// Override the session lifetime in seconds for this session.
    pub async fn set_expiry(&mut self, seconds: u64) -> Result<(), SessionError> {
        self.insert(EXPIRY_FIELD, seconds.to_string()).await
    }

    /// Seconds until expiry applied on the next save.
    pub fn get_expiry_age(&self) -> u64 {
        self.cache
            .as_ref()
            .and_then(|data| data.get(EXPIRY_FIELD))
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.default_expiry)
    }

    /// Keep the data but move it under a new key, dropping the old entry.
    /// When the new entry cannot be written the session keeps its old key.
    pub async fn cycle_key(&mut self) -> Result<(), SessionError> {
        self.data().await?;
        let old_key = self.session_key.take();
        let was_modified = self.modified;
        if let Err(e) = self.create().await {
            self.session_key = old_key;
            self.modified = was_modified;
            return Err(e);
        }
        if let Some(old_key) = old_key {
            self.backend.remove(&old_key).await?;
            debug!("Cycled session key {} -> {:?}", old_key, self.session_key);
        }
        Ok(())
    }

    /// Clear all data and delete the backing entry.
    pub async fn flush(&mut self) -> Result<(), SessionError> {
        self.cache = Some(FieldMap::new());
        self.delete(None).await?;
        self.session_key = None;
        self.modified = true;
        Ok(())
    }

    async fn data(&mut self) -> Result<&mut FieldMap, SessionError> {
        if self.cache.is_none() {
            let loaded = match self.session_key.clone() {
                Some(key) => {
                    let fields = self.load(&key).await?;
                    // Unknown or expired key: never resurrect it on save.
                    if fields.is_empty() && !self.backend.exists(&key).await? {
                        self.session_key = None;
                    }
                    fields
                }
                None => FieldMap::new(),
            };
            self.cache = Some(loaded);
        }
        Ok(self.cache.get_or_insert_with(FieldMap::new))
    }

    async fn persist(&mut self, key: &str, must_create: bool) -> Result<(), SessionError> {
        let data = if must_create {
            self.cache.clone().unwrap_or_default()
        } else {
            self.data().await?.clone()
        };

        let mut fields = FieldMap::new();
        fields.insert(SESSION_KEY_FIELD.to_string(), key.to_string());
        fields.insert(SESSION_DATA_FIELD.to_string(), serde_json::to_string(&data)?);

        self.backend.store(key, &fields, self.get_expiry_age()).await
    }

    async fn new_session_key(&self) -> Result<String, SessionError> {
        loop {
            let key = Uuid::new_v4().simple().to_string();
            if !self.backend.exists(&key).await? {
                return Ok(key);
            }
        }
    }
}
