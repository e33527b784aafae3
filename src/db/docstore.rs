use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

/// Collection receiving relayed documents
pub const DOCUMENT_COLLECTION: &str = "mongodb_collection";

#[derive(Debug, Error)]
pub enum DocStoreError {
    #[error("Document store error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("Value is not a BSON document: {0}")]
    Conversion(#[from] mongodb::bson::ser::Error),

    #[error("Invalid document id '{0}'")]
    InvalidId(String),

    #[error("Unsupported aggregation stage '{0}'")]
    UnsupportedStage(String),
}

/// Schemaless document storage keyed by collection name.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append one document and return its generated id.
    async fn insert(&self, collection: &str, fields: Document) -> Result<String, DocStoreError>;

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DocStoreError>;

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>, DocStoreError>;

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>, DocStoreError>;

    /// Set `fields` on the document with id `id`. Returns the document as it
    /// was before the update, or `None` when no such document exists.
    async fn find_one_and_update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<Option<Document>, DocStoreError>;
}

/// Render an inserted `_id` the way callers see it.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}
