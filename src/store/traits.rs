use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::StoreResult;
use crate::{config::RunConfig, identifier::DocumentId};

/// A query predicate, always a JSON object.
pub type Filter = Map<String, Value>;

/// Access to the single collection being archived.
///
/// Implementations never delete by filter: the archiver fetches identifiers
/// and deletes exactly those, so a batch cannot grow between fetch and delete.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap round-trip to verify connectivity.
    async fn ping(&self) -> StoreResult<()>;

    /// Number of documents matching `filter`.
    async fn count(&self, filter: &Filter) -> StoreResult<u64>;

    /// Identifiers of up to `limit` documents matching `filter`.
    async fn find_ids(&self, filter: &Filter, limit: u32) -> StoreResult<Vec<DocumentId>>;

    /// Delete the documents with these identifiers. Returns how many were removed.
    async fn delete_ids(&self, ids: &[DocumentId]) -> StoreResult<u64>;
}

/// Opens a [`DocumentStore`] for a run.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &RunConfig) -> StoreResult<Arc<dyn DocumentStore>>;
}
