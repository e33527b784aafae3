use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::sync::OnceCell;
use tracing::info;

use super::{FieldMap, SessionBackend, SessionError};

/// Redis hash per session key, expiry delegated to Redis `EXPIRE`.
///
/// The connection is opened on first use and reused for the lifetime of the
/// backend.
pub struct RedisSessionBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisSessionBackend {
    pub fn new(redis_url: &str) -> Result<Self, SessionError> {
        let client = Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, SessionError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                info!("Connecting to session store...");
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn exists(&self, key: &str) -> Result<bool, SessionError> {
        let mut conn = self.connection().await?;
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    async fn fetch(&self, key: &str) -> Result<FieldMap, SessionError> {
        let mut conn = self.connection().await?;
        let fields: FieldMap = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn store(&self, key: &str, fields: &FieldMap, ttl_secs: u64) -> Result<(), SessionError> {
        let mut conn = self.connection().await?;
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(key, &items)
            .ignore()
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
