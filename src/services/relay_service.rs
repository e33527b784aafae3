use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::{DocStoreError, DOCUMENT_COLLECTION};
use crate::models::WrappedDocument;
use crate::relay::{RelayError, MONGO_INSERT_TOPIC};
use crate::services::auth_service::{PERSONAL_GROUP_KEY, USERNAME_KEY};
use crate::sessions::{SessionError, SessionStore};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum RelayFlowError {
    #[error("no data returned by the service")]
    NoUpstreamData,

    #[error("service response has no '{0}' field")]
    MissingField(&'static str),

    #[error("invalid group id '{0}' in session")]
    InvalidGroupId(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Store(#[from] DocStoreError),
}

/// Home page work for the current session. Returns the diagnostics to show.
///
/// Anonymous sessions cause no remote calls. For logged-in sessions the
/// upstream payload is wrapped with the session's group id, published,
/// immediately read back from the same topic and every message read is
/// inserted into the document store. Failures never abort the page; they
/// become a diagnostic string, generic in production.
pub async fn home_diagnostics(state: &AppState, session: &mut SessionStore) -> Vec<String> {
    let mut errors = Vec::new();

    let logged_in = match session.contains(USERNAME_KEY).await {
        Ok(found) => found,
        Err(e) => {
            error!("Failed to read session: {}", e);
            errors.push(diagnostic(state, &e.into()));
            return errors;
        }
    };
    if !logged_in {
        return errors;
    }

    match relay_upstream_data(state, session).await {
        Ok(inserted) => debug!("Home relay inserted {} document(s)", inserted),
        Err(e) => {
            error!("Error retrieving data from service: {}", e);
            errors.push(diagnostic(state, &e));
        }
    }
    errors
}

/// Upstream -> wrap -> produce -> consume -> insert. Returns the number of
/// documents inserted.
pub async fn relay_upstream_data(state: &AppState, session: &mut SessionStore) -> Result<usize, RelayFlowError> {
    let api_data = state
        .upstream
        .service()
        .await
        .ok_or(RelayFlowError::NoUpstreamData)?;
    let json_data = api_data
        .get("json_data")
        .cloned()
        .ok_or(RelayFlowError::MissingField("json_data"))?;

    let Some(raw_group_id) = session.get(PERSONAL_GROUP_KEY).await? else {
        debug!("Session has no personal group, skipping relay");
        return Ok(0);
    };
    let group_id: i64 = raw_group_id
        .parse()
        .map_err(|_| RelayFlowError::InvalidGroupId(raw_group_id.clone()))?;

    let wrapped = WrappedDocument::new(group_id, json_data);
    let event = serde_json::to_value(&wrapped).map_err(RelayError::from)?;
    state.relay.produce(MONGO_INSERT_TOPIC, &event).await?;

    // Reading back in the same request only stands in for a separate
    // consumer process; whatever misses the poll window is not inserted here.
    let docs_to_insert = state.relay.consume(MONGO_INSERT_TOPIC).await?;

    for doc in &docs_to_insert {
        let fields = mongodb::bson::to_document(doc).map_err(DocStoreError::from)?;
        state.documents.insert(DOCUMENT_COLLECTION, fields).await?;
    }
    info!(
        "Relayed upstream data for group {}: {} document(s) inserted",
        group_id,
        docs_to_insert.len()
    );
    Ok(docs_to_insert.len())
}

fn diagnostic(state: &AppState, e: &RelayFlowError) -> String {
    if state.config.is_production() {
        "Error retrieving data from service.".to_string()
    } else {
        format!("Error retrieving data from service: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::UpstreamService;
    use crate::config::Config;
    use crate::db::{DocumentStore, MemoryAuthStore, MemoryDocumentStore};
    use crate::relay::{EventRelay, MemoryRelay};
    use crate::sessions::MemorySessionBackend;
    use async_trait::async_trait;
    use rdkafka::error::{KafkaError, RDKafkaErrorCode};
    use mongodb::bson::{doc, Bson, Document};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const WINDOW: Duration = Duration::from_millis(200);

    #[derive(Default)]
    struct Calls(AtomicUsize);

    impl Calls {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct CountingUpstream {
        payload: Option<Value>,
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl UpstreamService for CountingUpstream {
        async fn service(&self) -> Option<Value> {
            self.calls.hit();
            self.payload.clone()
        }

        async fn service_with_parameter(&self, _pk: &str) -> Option<Value> {
            self.calls.hit();
            self.payload.clone()
        }
    }

    struct CountingRelay {
        inner: MemoryRelay,
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl EventRelay for CountingRelay {
        async fn produce(&self, topic: &str, value: &Value) -> Result<(), RelayError> {
            self.calls.hit();
            self.inner.produce(topic, value).await
        }

        async fn consume(&self, topic: &str) -> Result<Vec<Value>, RelayError> {
            self.calls.hit();
            self.inner.consume(topic).await
        }
    }

    struct CountingDocs {
        inner: Arc<MemoryDocumentStore>,
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl DocumentStore for CountingDocs {
        async fn insert(&self, collection: &str, fields: Document) -> Result<String, DocStoreError> {
            self.calls.hit();
            self.inner.insert(collection, fields).await
        }

        async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DocStoreError> {
            self.calls.hit();
            self.inner.find(collection, filter).await
        }

        async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DocStoreError> {
            self.calls.hit();
            self.inner.find_one(collection, filter).await
        }

        async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DocStoreError> {
            self.calls.hit();
            self.inner.aggregate(collection, pipeline).await
        }

        async fn find_one_and_update(
            &self,
            collection: &str,
            id: &str,
            fields: Document,
        ) -> Result<Option<Document>, DocStoreError> {
            self.calls.hit();
            self.inner.find_one_and_update(collection, id, fields).await
        }
    }

    struct Harness {
        state: AppState,
        backend: Arc<MemorySessionBackend>,
        docs: Arc<MemoryDocumentStore>,
        calls: Arc<Calls>,
    }

    fn harness(payload: Option<Value>, replication_delay: Duration, config: Config) -> Harness {
        let calls = Arc::new(Calls::default());
        let backend = Arc::new(MemorySessionBackend::new());
        let docs = Arc::new(MemoryDocumentStore::new());
        let state = AppState {
            config,
            sessions: backend.clone(),
            relay: Arc::new(CountingRelay {
                inner: MemoryRelay::with_replication_delay(WINDOW, replication_delay),
                calls: calls.clone(),
            }),
            documents: Arc::new(CountingDocs {
                inner: docs.clone(),
                calls: calls.clone(),
            }),
            upstream: Arc::new(CountingUpstream {
                payload,
                calls: calls.clone(),
            }),
            auth: Arc::new(MemoryAuthStore::new()),
        };
        Harness { state, backend, docs, calls }
    }

    async fn logged_in_session(h: &Harness, group_id: &str) -> SessionStore {
        let mut session = SessionStore::new(h.backend.clone(), None, 300);
        session.insert(USERNAME_KEY, "alice").await.unwrap();
        session.insert(PERSONAL_GROUP_KEY, group_id).await.unwrap();
        session.save(false).await.unwrap();
        session
    }

    fn as_i64(value: Option<&Bson>) -> Option<i64> {
        value.and_then(|b| b.as_i64().or_else(|| b.as_i32().map(i64::from)))
    }

    #[tokio::test(start_paused = true)]
    async fn logged_in_session_relays_one_document_into_collection() {
        let h = harness(Some(json!({"json_data": true})), Duration::ZERO, Config::default());
        let mut session = logged_in_session(&h, "7").await;

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert!(errors.is_empty(), "unexpected diagnostics: {errors:?}");

        let stored = h.docs.documents(DOCUMENT_COLLECTION);
        assert_eq!(stored.len(), 1);
        let doc = &stored[0];
        assert_eq!(as_i64(doc.get("group_id")), Some(7));
        assert!(doc.get_bool("data").unwrap());
        assert!(!doc.get_bool("deleted").unwrap());
        assert!(!doc.get_bool("updated").unwrap());
        assert_eq!(as_i64(doc.get("created")), as_i64(doc.get("modified")));
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_session_makes_no_remote_calls() {
        let h = harness(Some(json!({"json_data": true})), Duration::ZERO, Config::default());
        let mut session = SessionStore::new(h.backend.clone(), None, 300);

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert!(errors.is_empty());
        assert_eq!(h.calls.count(), 0);
        assert!(h.docs.documents(DOCUMENT_COLLECTION).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_replication_loses_the_event_for_this_request() {
        let h = harness(Some(json!({"json_data": true})), Duration::from_secs(1), Config::default());
        let mut session = logged_in_session(&h, "7").await;

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert!(errors.is_empty());
        assert!(h.docs.documents(DOCUMENT_COLLECTION).is_empty());

        // The late message surfaces on the next request, whose own event now lags.
        tokio::time::advance(Duration::from_secs(1)).await;
        home_diagnostics(&h.state, &mut session).await;
        assert_eq!(h.docs.documents(DOCUMENT_COLLECTION).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_upstream_data_is_a_diagnostic_not_a_failure() {
        let h = harness(None, Duration::ZERO, Config::default());
        let mut session = logged_in_session(&h, "7").await;

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert_eq!(errors, vec!["Error retrieving data from service: no data returned by the service"]);
        assert_eq!(h.calls.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn production_diagnostics_hide_error_detail() {
        let config = Config {
            environment: "production".to_string(),
            ..Config::default()
        };
        let h = harness(Some(json!({"other": 1})), Duration::ZERO, config);
        let mut session = logged_in_session(&h, "7").await;

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert_eq!(errors, vec!["Error retrieving data from service."]);
    }

    #[tokio::test(start_paused = true)]
    async fn session_without_group_skips_relay() {
        let h = harness(Some(json!({"json_data": true})), Duration::ZERO, Config::default());
        let mut session = SessionStore::new(h.backend.clone(), None, 300);
        session.insert(USERNAME_KEY, "alice").await.unwrap();

        let inserted = relay_upstream_data(&h.state, &mut session).await.unwrap();
        assert_eq!(inserted, 0);
        // Only the upstream call happened.
        assert_eq!(h.calls.count(), 1);
    }

    struct BrokerDown;

    #[async_trait]
    impl EventRelay for BrokerDown {
        async fn produce(&self, _topic: &str, _value: &Value) -> Result<(), RelayError> {
            Err(KafkaError::MessageProduction(RDKafkaErrorCode::BrokerTransportFailure).into())
        }

        async fn consume(&self, _topic: &str) -> Result<Vec<Value>, RelayError> {
            Err(KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerTransportFailure).into())
        }
    }

    struct StoreDown;

    fn store_down() -> DocStoreError {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        DocStoreError::Driver(mongodb::error::Error::from(io))
    }

    #[async_trait]
    impl DocumentStore for StoreDown {
        async fn insert(&self, _collection: &str, _fields: Document) -> Result<String, DocStoreError> {
            Err(store_down())
        }

        async fn find(&self, _collection: &str, _filter: Document) -> Result<Vec<Document>, DocStoreError> {
            Err(store_down())
        }

        async fn find_one(&self, _collection: &str, _filter: Document) -> Result<Option<Document>, DocStoreError> {
            Err(store_down())
        }

        async fn aggregate(&self, _collection: &str, _pipeline: Vec<Document>) -> Result<Vec<Document>, DocStoreError> {
            Err(store_down())
        }

        async fn find_one_and_update(
            &self,
            _collection: &str,
            _id: &str,
            _fields: Document,
        ) -> Result<Option<Document>, DocStoreError> {
            Err(store_down())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_broker_becomes_one_diagnostic() {
        let mut h = harness(Some(json!({"json_data": true})), Duration::ZERO, Config::default());
        h.state.relay = Arc::new(BrokerDown);
        let mut session = logged_in_session(&h, "7").await;

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error retrieving data from service: Broker error"));
        assert!(h.docs.documents(DOCUMENT_COLLECTION).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_document_store_becomes_one_diagnostic() {
        let mut h = harness(Some(json!({"json_data": true})), Duration::ZERO, Config::default());
        h.state.documents = Arc::new(StoreDown);
        let mut session = logged_in_session(&h, "7").await;

        let errors = home_diagnostics(&h.state, &mut session).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error retrieving data from service: Document store error"));
    }

    #[tokio::test(start_paused = true)]
    async fn non_object_event_fails_at_document_conversion() {
        let h = harness(Some(json!({"json_data": true})), Duration::ZERO, Config::default());
        h.state.relay.produce(MONGO_INSERT_TOPIC, &json!([1, 2])).await.unwrap();
        let mut session = logged_in_session(&h, "7").await;

        let err = relay_upstream_data(&h.state, &mut session).await.unwrap_err();
        assert!(matches!(err, RelayFlowError::Store(DocStoreError::Conversion(_))));
        assert!(h.docs.find(DOCUMENT_COLLECTION, doc! {}).await.unwrap().is_empty());
    }
}
