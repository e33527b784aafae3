pub mod memory;
pub mod redis_backend;
pub mod store;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use memory::MemorySessionBackend;
pub use redis_backend::RedisSessionBackend;
pub use store::SessionStore;

/// Flat string map stored for a session
pub type FieldMap = HashMap<String, String>;

/// Hash field holding the session key itself
pub const SESSION_KEY_FIELD: &str = "session_key";
/// Hash field holding the JSON-encoded session data
pub const SESSION_DATA_FIELD: &str = "session_data";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store unavailable: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Corrupt session payload: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key/hash storage with native per-key expiry.
///
/// Entries are whole hashes; `store` upserts the given fields and resets the
/// entry's time to live in the same round trip.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, SessionError>;

    /// Returns every field of the entry, or an empty map when absent.
    async fn fetch(&self, key: &str) -> Result<FieldMap, SessionError>;

    async fn store(&self, key: &str, fields: &FieldMap, ttl_secs: u64) -> Result<(), SessionError>;

    async fn remove(&self, key: &str) -> Result<(), SessionError>;
}
