pub mod auth_store;
pub mod dbauth;
pub mod docstore;
pub mod memory_auth;
pub mod memory_docs;
pub mod mongo;

pub use auth_store::{AuthError, AuthStore, Group, User};
pub use dbauth::DbAuth;
pub use docstore::{DocStoreError, DocumentStore, DOCUMENT_COLLECTION};
pub use memory_auth::MemoryAuthStore;
pub use memory_docs::MemoryDocumentStore;
pub use mongo::MongoStore;
