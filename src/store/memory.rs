use std::{cmp::Ordering, collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{
    error::{StoreError, StoreResult},
    traits::{DocumentStore, Filter, StoreConnector},
};
use crate::{
    config::RunConfig,
    identifier::{DocumentId, normalize_value},
};

/// In-memory [`DocumentStore`] with insertion-ordered documents.
///
/// Understands a small subset of query operators: equality, `$eq`, `$ne`,
/// `$in`, `$nin`, `$gt`, `$gte`, `$lt`, `$lte`, `$exists`, `$and` and `$or`.
/// Clones share the same documents.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    documents: Vec<Map<String, Value>>,
    reachable: bool,
    delete_calls: Vec<Vec<DocumentId>>,
    fail_deletes_after: Option<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                reachable: true,
                ..Default::default()
            })),
        }
    }

    /// A store whose `ping` always fails.
    pub fn unreachable() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Make every delete after the first `n` calls fail.
    pub async fn fail_deletes_after(&self, n: usize) {
        self.inner.lock().await.fail_deletes_after = Some(n);
    }

    /// Insert one document. It must be a JSON object with an `_id`.
    pub async fn insert(&self, document: Value) -> StoreResult<()> {
        let Value::Object(document) = document else {
            return Err(StoreError::Internal("document must be an object".into()));
        };
        if !document.contains_key("_id") {
            return Err(StoreError::Internal("document must have an _id".into()));
        }
        self.inner.lock().await.documents.push(document);
        Ok(())
    }

    pub async fn insert_many(&self, documents: impl IntoIterator<Item = Value>) -> StoreResult<()> {
        for document in documents {
            self.insert(document).await?;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Identifier sets passed to `delete_ids`, in call order.
    pub async fn delete_calls(&self) -> Vec<Vec<DocumentId>> {
        self.inner.lock().await.delete_calls.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.inner.lock().await.reachable {
            Ok(())
        } else {
            Err(StoreError::Connect("server selection timed out".into()))
        }
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let inner = self.inner.lock().await;
        let mut count = 0;
        for doc in &inner.documents {
            if matches_filter(doc, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn find_ids(&self, filter: &Filter, limit: u32) -> StoreResult<Vec<DocumentId>> {
        let inner = self.inner.lock().await;
        let mut ids = Vec::new();
        for doc in &inner.documents {
            if ids.len() >= limit as usize {
                break;
            }
            if matches_filter(doc, filter)?
                && let Some(id) = doc.get("_id")
            {
                ids.push(DocumentId::from_value(id));
            }
        }
        Ok(ids)
    }

    async fn delete_ids(&self, ids: &[DocumentId]) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        if let Some(limit) = inner.fail_deletes_after
            && inner.delete_calls.len() >= limit
        {
            return Err(StoreError::Query("write concern error".into()));
        }
        inner.delete_calls.push(ids.to_vec());

        let targets: HashSet<&DocumentId> = ids.iter().collect();
        let before = inner.documents.len();
        inner.documents.retain(|doc| {
            doc.get("_id")
                .map(|id| !targets.contains(&DocumentId::from_value(id)))
                .unwrap_or(true)
        });
        Ok((before - inner.documents.len()) as u64)
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self, _config: &RunConfig) -> StoreResult<Arc<dyn DocumentStore>> {
        Ok(Arc::new(self.clone()))
    }
}

fn matches_filter(doc: &Map<String, Value>, filter: &Filter) -> StoreResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => all_of(doc, condition)?,
            "$or" => any_of(doc, condition)?,
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported top-level operator {op}"
                )));
            }
            field => matches_condition(lookup(doc, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_of(doc: &Map<String, Value>, clauses: &Value) -> StoreResult<bool> {
    for clause in clause_list(clauses)? {
        if !matches_filter(doc, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_of(doc: &Map<String, Value>, clauses: &Value) -> StoreResult<bool> {
    for clause in clause_list(clauses)? {
        if matches_filter(doc, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn clause_list(clauses: &Value) -> StoreResult<Vec<&Filter>> {
    let Value::Array(items) = clauses else {
        return Err(StoreError::InvalidFilter("$and/$or expects an array".into()));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::InvalidFilter(
                "$and/$or clauses must be objects".into(),
            )),
        })
        .collect()
}

/// Resolve a dotted field path.
fn lookup<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn matches_condition(field: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let Value::Object(ops) = condition else {
        return Ok(equals(field, condition));
    };
    if !ops.keys().all(|k| k.starts_with('$')) || ops.contains_key("$oid") {
        return Ok(equals(field, condition));
    }

    for (op, operand) in ops {
        let matched = match op.as_str() {
            "$eq" => equals(field, operand),
            "$ne" => !equals(field, operand),
            "$in" => operand_list(op, operand)?.iter().any(|v| equals(field, v)),
            "$nin" => !operand_list(op, operand)?.iter().any(|v| equals(field, v)),
            "$gt" => compare(field, operand) == Some(Ordering::Greater),
            "$gte" => matches!(
                compare(field, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            "$lt" => compare(field, operand) == Some(Ordering::Less),
            "$lte" => matches!(
                compare(field, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            "$exists" => field.is_some() == operand.as_bool().unwrap_or(true),
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported operator {other}"
                )));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn operand_list<'a>(op: &str, operand: &'a Value) -> StoreResult<&'a Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| StoreError::InvalidFilter(format!("{op} expects an array")))
}

/// Missing fields equal `null`; hex and `$oid` forms of an identifier are equal.
fn equals(field: Option<&Value>, expected: &Value) -> bool {
    let actual = field.unwrap_or(&Value::Null);
    normalize_value(actual) == normalize_value(expected)
}

fn compare(field: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (field?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
