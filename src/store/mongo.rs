use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection,
    bson::{Bson, Document, doc, oid::ObjectId},
};
use serde_json::Value;

use super::{
    error::{StoreError, StoreResult},
    traits::{DocumentStore, Filter, StoreConnector},
};
use crate::{
    config::{Namespace, RunConfig},
    identifier::DocumentId,
};

/// [`DocumentStore`] backed by the official MongoDB driver.
pub struct MongoStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Create a client for `uri` scoped to `namespace`.
    ///
    /// The driver connects lazily; use [`DocumentStore::ping`] to verify
    /// the deployment is reachable.
    pub async fn connect(uri: &str, namespace: &Namespace) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        let collection = client
            .database(&namespace.database)
            .collection::<Document>(&namespace.collection);

        tracing::debug!(namespace = %namespace, "MongoDB client created");

        Ok(Self { client, collection })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> StoreResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(())
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let filter = filter_to_document(filter)?;
        Ok(self.collection.count_documents(filter).await?)
    }

    async fn find_ids(&self, filter: &Filter, limit: u32) -> StoreResult<Vec<DocumentId>> {
        let filter = filter_to_document(filter)?;
        let docs: Vec<Document> = self
            .collection
            .find(filter)
            .projection(doc! { "_id": 1 })
            .limit(i64::from(limit))
            .await?
            .try_collect()
            .await?;

        docs.into_iter()
            .map(|doc| {
                doc.get("_id")
                    .cloned()
                    .map(bson_to_id)
                    .ok_or_else(|| StoreError::Internal("document without _id".to_string()))
            })
            .collect()
    }

    async fn delete_ids(&self, ids: &[DocumentId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.iter().map(id_to_bson).collect::<StoreResult<Vec<_>>>()?;
        let result = self
            .collection
            .delete_many(doc! { "_id": { "$in": ids } })
            .await?;
        Ok(result.deleted_count)
    }
}

/// Connects to the deployment named by the run configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self, config: &RunConfig) -> StoreResult<Arc<dyn DocumentStore>> {
        let store = MongoStore::connect(&config.uri, &config.namespace).await?;
        Ok(Arc::new(store))
    }
}

/// Filters are relaxed extended JSON, so `{"$oid": ..}` and `{"$date": ..}`
/// wrappers become native BSON values.
fn filter_to_document(filter: &Filter) -> StoreResult<Document> {
    match Bson::try_from(Value::Object(filter.clone())) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(StoreError::InvalidFilter(format!(
            "expected a document, got {other}"
        ))),
        Err(e) => Err(StoreError::InvalidFilter(e.to_string())),
    }
}

fn id_to_bson(id: &DocumentId) -> StoreResult<Bson> {
    match id {
        DocumentId::Hex(hex) | DocumentId::Wrapped(hex) => ObjectId::parse_str(hex)
            .map(Bson::ObjectId)
            .map_err(|e| StoreError::InvalidFilter(format!("invalid object id '{hex}': {e}"))),
        DocumentId::Opaque(value) => {
            Bson::try_from(value.clone()).map_err(|e| StoreError::InvalidFilter(e.to_string()))
        }
    }
}

fn bson_to_id(value: Bson) -> DocumentId {
    match value {
        Bson::ObjectId(oid) => DocumentId::Hex(oid.to_hex()),
        other => DocumentId::Opaque(other.into_relaxed_extjson()),
    }
}
