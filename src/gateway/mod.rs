//! The remote data gateway: a CRUD-shaped interface over the document store.
//!
//! The moderation engine only ever talks to the store through this trait, so
//! rule logic stays testable against an in-memory stand-in. Domain entities
//! are soft-deleted (status flips); nothing here hard-deletes a document.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

mod sqlite;
pub use sqlite::SqliteGateway;

#[cfg(test)]
pub(crate) mod memory;

/// Errors surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    /// The caller passed an `expected_rev` that no longer matches the stored
    /// document. A concurrent edit won; the caller must re-read.
    #[error("document {collection}/{id} was modified concurrently")]
    Conflict { collection: String, id: String },
    #[error("database error")]
    Db(#[from] sqlx::Error),
    #[error("malformed document")]
    Decode(#[from] serde_json::Error),
}

/// A stored document together with its revision counter.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub rev: i64,
    pub value: Value,
}

impl Document {
    /// Decode the document body into a typed entity.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// A field-equality filter. Filtering happens client-side, after the fetch.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            equals: equals.into(),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        value.get(&self.field) == Some(&self.equals)
    }
}

pub(crate) fn apply_filters(docs: Vec<Document>, filters: &[Filter]) -> Vec<Document> {
    docs.into_iter()
        .filter(|d| filters.iter().all(|f| f.matches(&d.value)))
        .collect()
}

/// What happened to a document. Delivered on the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocEventKind {
    Created,
    Updated,
}

/// A change-feed event emitted after every successful write.
#[derive(Debug, Clone)]
pub struct DocEvent {
    pub collection: String,
    pub id: String,
    pub kind: DocEventKind,
}

/// The consumed capability set of the document store.
pub trait Gateway: Send + Sync {
    /// Fetch every document in a collection, filtered client-side.
    async fn fetch_all(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, GatewayError>;

    /// Fetch one document by id.
    async fn fetch_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, GatewayError>;

    /// Create a document. If `data` carries a string `id` field it is used as
    /// the document id; otherwise a fresh one is generated. Returns the id.
    async fn create(&self, collection: &str, data: Value) -> Result<String, GatewayError>;

    /// Merge-patch a document. RFC 7386 semantics: top-level fields in
    /// `patch` replace the stored ones, an explicit null removes a key.
    /// With `expected_rev`, the write fails with `Conflict` unless the stored
    /// revision still matches.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        expected_rev: Option<i64>,
    ) -> Result<(), GatewayError>;

    /// Atomically add `delta` to a numeric field, treating a missing field
    /// as zero.
    async fn increment_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), GatewayError>;

    /// Subscribe to the change feed. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<DocEvent>;
}

/// Fetch a collection decoded into typed entities, paired with revisions.
pub async fn fetch_all_as<T: DeserializeOwned, G: Gateway>(
    gateway: &G,
    collection: &str,
    filters: &[Filter],
) -> Result<Vec<T>, GatewayError> {
    let docs = gateway.fetch_all(collection, filters).await?;
    docs.iter().map(Document::decode).collect()
}

/// Fetch one typed entity, or `NotFound`.
pub async fn fetch_one_as<T: DeserializeOwned, G: Gateway>(
    gateway: &G,
    collection: &str,
    id: &str,
) -> Result<T, GatewayError> {
    match gateway.fetch_by_id(collection, id).await? {
        Some(doc) => doc.decode(),
        None => Err(GatewayError::NotFound {
            collection: collection.to_owned(),
            id: id.to_owned(),
        }),
    }
}
