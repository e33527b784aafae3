use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Upstream payload annotated with its owning group and bookkeeping fields
/// before it is queued for storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WrappedDocument {
    pub group_id: i64,
    #[schema(value_type = Object)]
    pub data: Value,
    /// Epoch milliseconds
    pub created: i64,
    /// Epoch milliseconds
    pub modified: i64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub updated: bool,
}

impl WrappedDocument {
    pub fn new(group_id: i64, data: Value) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            group_id,
            data,
            created: now,
            modified: now,
            deleted: false,
            updated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DocumentStore, MemoryDocumentStore};
    use serde_json::json;

    #[test]
    fn new_document_has_equal_timestamps_and_cleared_flags() {
        let before = Utc::now().timestamp_millis();
        let doc = WrappedDocument::new(7, json!({"a": 1}));
        let after = Utc::now().timestamp_millis();

        assert_eq!(doc.created, doc.modified);
        assert!(doc.created >= before && doc.created <= after);
        assert!(!doc.deleted);
        assert!(!doc.updated);
    }

    #[test]
    fn encodes_with_the_event_keys() {
        let doc = WrappedDocument::new(7, json!(true));
        let value = serde_json::to_value(&doc).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["created", "data", "deleted", "group_id", "modified", "updated"]);
    }

    #[tokio::test]
    async fn json_round_trip_then_insert_preserves_group_and_data() {
        let doc = WrappedDocument::new(42, json!({"reading": [1.5, 2.5], "probe": "p-1"}));
        let encoded = serde_json::to_vec(&doc).unwrap();
        let decoded: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(serde_json::from_value::<WrappedDocument>(decoded.clone()).unwrap(), doc);

        let store = MemoryDocumentStore::new();
        let bson_doc = mongodb::bson::to_document(&decoded).unwrap();
        store.insert("c", bson_doc).await.unwrap();

        let stored = store.documents("c").remove(0);
        let back: Value = mongodb::bson::from_document(stored).unwrap();
        assert_eq!(back["group_id"], json!(42));
        assert_eq!(back["data"], doc.data);
    }
}
