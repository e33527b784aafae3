use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::collections::HashMap;
use std::sync::Mutex;

use super::docstore::{id_to_string, DocStoreError, DocumentStore};

/// In-process document store. Filters match on top-level equality only and
/// pipelines accept `$match`, `$skip` and `$limit`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every document in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections.get(collection).cloned().unwrap_or_default()
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

fn as_count(stage: &str, value: &Bson) -> Result<usize, DocStoreError> {
    match value {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        _ => Err(DocStoreError::UnsupportedStage(format!("{} {}", stage, value))),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: &str, fields: Document) -> Result<String, DocStoreError> {
        let id = fields
            .get("_id")
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

        let mut stored = Document::new();
        stored.insert("_id", id.clone());
        for (k, v) in fields {
            if k != "_id" {
                stored.insert(k, v);
            }
        }

        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections.entry(collection.to_string()).or_default().push(stored);
        Ok(id_to_string(&id))
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DocStoreError> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, &filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DocStoreError> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DocStoreError> {
        let mut docs = self.documents(collection);
        for stage in &pipeline {
            let Some((name, arg)) = stage.iter().next() else {
                continue;
            };
            match (name.as_str(), arg) {
                ("$match", Bson::Document(filter)) => docs.retain(|d| matches(d, filter)),
                ("$skip", n) => {
                    let n = as_count(name, n)?.min(docs.len());
                    docs.drain(..n);
                }
                ("$limit", n) => docs.truncate(as_count(name, n)?),
                _ => return Err(DocStoreError::UnsupportedStage(name.clone())),
            }
        }
        Ok(docs)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<Option<Document>, DocStoreError> {
        let oid = ObjectId::parse_str(id).map_err(|_| DocStoreError::InvalidId(id.to_string()))?;
        let target = Bson::ObjectId(oid);

        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.get("_id") == Some(&target)))
        else {
            return Ok(None);
        };

        let before = doc.clone();
        for (k, v) in fields {
            doc.insert(k, v);
        }
        Ok(Some(before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn insert_assigns_object_id_and_find_filters_by_equality() {
        let store = MemoryDocumentStore::new();
        let id = store.insert("c", doc! { "group_id": 7, "data": true }).await.unwrap();
        store.insert("c", doc! { "group_id": 8, "data": false }).await.unwrap();

        assert!(ObjectId::parse_str(&id).is_ok());
        let found = store.find("c", doc! { "group_id": 7 }).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].get_bool("data").unwrap());
        assert_eq!(found[0].get_object_id("_id").unwrap().to_hex(), id);
    }

    #[tokio::test]
    async fn find_one_and_update_sets_fields_without_upserting() {
        let store = MemoryDocumentStore::new();
        let id = store.insert("c", doc! { "updated": false, "data": 1 }).await.unwrap();

        let before = store
            .find_one_and_update("c", &id, doc! { "updated": true })
            .await
            .unwrap()
            .unwrap();
        assert!(!before.get_bool("updated").unwrap());

        let after = store.find_one("c", doc! { "data": 1 }).await.unwrap().unwrap();
        assert!(after.get_bool("updated").unwrap());

        let missing = ObjectId::new().to_hex();
        assert!(store
            .find_one_and_update("c", &missing, doc! { "updated": true })
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.documents("c").len(), 1);
    }

    #[tokio::test]
    async fn aggregate_applies_match_skip_and_limit() {
        let store = MemoryDocumentStore::new();
        for n in 0..5 {
            store.insert("c", doc! { "n": n, "even": n % 2 == 0 }).await.unwrap();
        }

        let docs = store
            .aggregate(
                "c",
                vec![doc! { "$match": { "even": true } }, doc! { "$skip": 1 }, doc! { "$limit": 1 }],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_i32("n").unwrap(), 2);

        let err = store
            .aggregate("c", vec![doc! { "$group": { "_id": "$even" } }])
            .await
            .unwrap_err();
        assert!(matches!(err, DocStoreError::UnsupportedStage(stage) if stage == "$group"));
    }
}
