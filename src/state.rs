use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{StaticUpstream, UpstreamClient, UpstreamService};
use crate::config::Config;
use crate::db::{AuthStore, DbAuth, DocumentStore, MemoryAuthStore, MemoryDocumentStore, MongoStore};
use crate::relay::{EventRelay, KafkaRelay, MemoryRelay};
use crate::sessions::{MemorySessionBackend, RedisSessionBackend, SessionBackend};

/// Components shared by every request
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionBackend>,
    pub relay: Arc<dyn EventRelay>,
    pub documents: Arc<dyn DocumentStore>,
    pub upstream: Arc<dyn UpstreamService>,
    pub auth: Arc<dyn AuthStore>,
}

impl AppState {
    /// Build every component from `config`. A component whose backing
    /// service is not configured (or cannot be reached at startup) runs
    /// in-process instead.
    pub async fn from_config(config: Config) -> Arc<Self> {
        let sessions: Arc<dyn SessionBackend> = match &config.redis_url {
            Some(url) => match RedisSessionBackend::new(url) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    error!("Invalid Redis URL: {}", e);
                    warn!("Sessions will be kept in memory");
                    Arc::new(MemorySessionBackend::new())
                }
            },
            None => {
                warn!("No Redis URL configured - sessions will be kept in memory");
                Arc::new(MemorySessionBackend::new())
            }
        };

        let relay: Arc<dyn EventRelay> = match KafkaRelay::from_config(&config) {
            Some(relay) => Arc::new(relay),
            None => {
                warn!("No Kafka brokers configured - events will be relayed in memory");
                Arc::new(MemoryRelay::new(config.kafka_poll_window()))
            }
        };

        let documents: Arc<dyn DocumentStore> = match MongoStore::from_config(&config) {
            Some(store) => Arc::new(store),
            None => {
                warn!("No MongoDB URL configured - documents will be kept in memory");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let upstream: Arc<dyn UpstreamService> = match &config.upstream_base_url {
            Some(url) => match UpstreamClient::new(url.clone(), &config) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    error!("Failed to build upstream client: {}", e);
                    Arc::new(StaticUpstream)
                }
            },
            None => {
                warn!("No upstream service configured - using placeholder data");
                Arc::new(StaticUpstream)
            }
        };

        let auth: Arc<dyn AuthStore> = match &config.db_url {
            Some(db_url) => match DbAuth::new(db_url).await {
                Ok(db) => {
                    info!("Authentication database initialized successfully");
                    Arc::new(db)
                }
                Err(e) => {
                    error!("Failed to initialize authentication database: {}", e);
                    warn!("Accounts will be kept in memory");
                    Arc::new(MemoryAuthStore::new())
                }
            },
            None => {
                warn!("No database URL configured - accounts will be kept in memory");
                Arc::new(MemoryAuthStore::new())
            }
        };

        Arc::new(Self {
            config,
            sessions,
            relay,
            documents,
            upstream,
            auth,
        })
    }
}
