pub mod kafka;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use kafka::KafkaRelay;
pub use memory::MemoryRelay;

/// Topic carrying wrapped documents on their way to the document store
pub const MONGO_INSERT_TOPIC: &str = "mongo_insert";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Broker error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Produce-then-consume round trip of JSON messages on a named topic.
///
/// `consume` returns only what arrives within one bounded poll window and
/// commits it for the relay's consumer group, so a message is seen by at most
/// one `consume` call and may be missed entirely by the call that follows its
/// `produce`.
#[async_trait]
pub trait EventRelay: Send + Sync {
    /// Publish one UTF-8 JSON message and wait for the broker's ack.
    async fn produce(&self, topic: &str, value: &Value) -> Result<(), RelayError>;

    async fn consume(&self, topic: &str) -> Result<Vec<Value>, RelayError>;
}
