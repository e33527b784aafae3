use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::{Client, Database};
use std::future::Future;
use tracing::{debug, info};

use super::docstore::{id_to_string, DocStoreError, DocumentStore};
use crate::config::Config;

/// MongoDB document store.
///
/// Each operation opens its own client and shuts it down before returning,
/// on success and on error alike. There is no pooling across calls.
#[derive(Debug, Clone)]
pub struct MongoStore {
    url: String,
    database: String,
}

impl MongoStore {
    pub fn new(url: String, database: String) -> Self {
        Self { url, database }
    }

    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .mongo_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.mongo_database_name.clone()))
    }

    async fn with_database<T, F, Fut>(&self, op: F) -> Result<T, DocStoreError>
    where
        F: FnOnce(Database) -> Fut + Send,
        Fut: Future<Output = Result<T, mongodb::error::Error>> + Send,
        T: Send,
    {
        let client = Client::with_uri_str(&self.url).await?;
        let result = op(client.database(&self.database)).await;
        client.shutdown().await;
        Ok(result?)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert(&self, collection: &str, fields: Document) -> Result<String, DocStoreError> {
        let collection = collection.to_string();
        let inserted = self
            .with_database(|db| async move {
                db.collection::<Document>(&collection).insert_one(fields).await
            })
            .await?;

        let id = id_to_string(&inserted.inserted_id);
        info!("Inserted document {}", id);
        Ok(id)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DocStoreError> {
        let collection = collection.to_string();
        self.with_database(|db| async move {
            let cursor = db.collection::<Document>(&collection).find(filter).await?;
            cursor.try_collect().await
        })
        .await
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DocStoreError> {
        let collection = collection.to_string();
        self.with_database(|db| async move {
            db.collection::<Document>(&collection).find_one(filter).await
        })
        .await
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DocStoreError> {
        let collection = collection.to_string();
        debug!("Aggregating over '{}' with {} stage(s)", collection, pipeline.len());
        self.with_database(|db| async move {
            let cursor = db.collection::<Document>(&collection).aggregate(pipeline).await?;
            cursor.try_collect().await
        })
        .await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<Option<Document>, DocStoreError> {
        let oid = ObjectId::parse_str(id).map_err(|_| DocStoreError::InvalidId(id.to_string()))?;
        let collection = collection.to_string();
        self.with_database(|db| async move {
            db.collection::<Document>(&collection)
                .find_one_and_update(doc! { "_id": oid }, doc! { "$set": fields })
                .await
        })
        .await
    }
}
