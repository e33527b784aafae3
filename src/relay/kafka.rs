use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::Message;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::{EventRelay, RelayError};
use crate::config::Config;

/// Kafka-backed relay. Producer and consumer are created per call and
/// released when the call returns, whichever way it returns.
#[derive(Debug, Clone)]
pub struct KafkaRelay {
    bootstrap_servers: String,
    group_id: String,
    poll_window: Duration,
    send_timeout: Duration,
}

impl KafkaRelay {
    pub fn new(bootstrap_servers: String, group_id: String, poll_window: Duration, send_timeout: Duration) -> Self {
        Self {
            bootstrap_servers,
            group_id,
            poll_window,
            send_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Option<Self> {
        config.kafka_bootstrap_servers.as_ref().map(|servers| {
            Self::new(
                servers.clone(),
                config.kafka_group_id.clone(),
                config.kafka_poll_window(),
                config.kafka_send_timeout(),
            )
        })
    }

    fn producer_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.bootstrap_servers)
            .set("message.timeout.ms", self.send_timeout.as_millis().to_string());
        cfg
    }

    fn consumer_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false");
        cfg
    }
}

#[async_trait]
impl EventRelay for KafkaRelay {
    async fn produce(&self, topic: &str, value: &Value) -> Result<(), RelayError> {
        let payload = serde_json::to_vec(value)?;
        let producer: FutureProducer = self.producer_config().create()?;

        let delivery = producer
            .send(FutureRecord::<(), _>::to(topic).payload(&payload), self.send_timeout)
            .await
            .map_err(|(e, _)| e)?;
        producer.flush(self.send_timeout)?;

        debug!("Delivered event to '{}': {:?}", topic, delivery);
        Ok(())
    }

    async fn consume(&self, topic: &str) -> Result<Vec<Value>, RelayError> {
        let consumer: StreamConsumer = self.consumer_config().create()?;
        consumer.subscribe(&[topic])?;

        let deadline = Instant::now() + self.poll_window;
        let mut values = Vec::new();
        let mut received = 0usize;

        while let Ok(next) = timeout_at(deadline, consumer.recv()).await {
            let message = next?;
            received += 1;
            if let Some(value) = decode_payload(topic, message.offset(), message.payload()) {
                values.push(value);
            }
        }

        if received > 0 {
            consumer.commit_consumer_state(CommitMode::Sync)?;
        }
        info!("Consumed {} event(s) from '{}'", values.len(), topic);
        Ok(values)
    }
}

// Undecodable messages are skipped so their offsets still get committed.
fn decode_payload(topic: &str, offset: i64, payload: Option<&[u8]>) -> Option<Value> {
    let Some(payload) = payload else {
        warn!("Skipping empty message at offset {} on '{}'", offset, topic);
        return None;
    };
    match serde_json::from_slice(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping undecodable message at offset {} on '{}': {}", offset, topic, e);
            None
        }
    }
}
