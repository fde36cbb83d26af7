//! Document identifier classification and normalization.
//!
//! The dump tool expects object identifiers in extended JSON form
//! (`{"$oid": "..."}`), while filters written by operators and identifiers
//! read back from the store may use a bare 24-character hex string. This
//! module converts between the two without guessing about any other shape.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use serde_json::{Map, Value, json};

/// Extended JSON key for object identifiers.
pub const OID_KEY: &str = "$oid";

/// Identifier of one stored document.
#[derive(Debug, Clone)]
pub enum DocumentId {
    /// A bare 24-character hex string.
    Hex(String),
    /// An extended JSON wrapper, `{"$oid": "<hex>"}`.
    Wrapped(String),
    /// Any other identifier shape, passed through untouched.
    Opaque(Value),
}

impl DocumentId {
    /// Classify a raw identifier value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if is_object_id_hex(s) => DocumentId::Hex(s.clone()),
            Value::Object(map) if map.len() == 1 => match map.get(OID_KEY) {
                Some(Value::String(hex)) => DocumentId::Wrapped(hex.clone()),
                _ => DocumentId::Opaque(value.clone()),
            },
            other => DocumentId::Opaque(other.clone()),
        }
    }

    /// The hex digits when this is an object identifier in either form.
    pub fn object_id_hex(&self) -> Option<&str> {
        match self {
            DocumentId::Hex(hex) | DocumentId::Wrapped(hex) => Some(hex),
            DocumentId::Opaque(_) => None,
        }
    }

    /// The form written into dump tool queries.
    pub fn normalized(&self) -> Value {
        match self {
            DocumentId::Hex(hex) | DocumentId::Wrapped(hex) => json!({ OID_KEY: hex }),
            DocumentId::Opaque(value) => value.clone(),
        }
    }
}

impl From<Value> for DocumentId {
    fn from(value: Value) -> Self {
        DocumentId::from_value(&value)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId::from_value(&Value::String(value.to_string()))
    }
}

// Hex and Wrapped forms of the same identifier denote the same document.
impl PartialEq for DocumentId {
    fn eq(&self, other: &Self) -> bool {
        match (self.object_id_hex(), other.object_id_hex()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => match (self, other) {
                (DocumentId::Opaque(a), DocumentId::Opaque(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for DocumentId {}

impl Hash for DocumentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DocumentId::Hex(hex) | DocumentId::Wrapped(hex) => {
                0u8.hash(state);
                hex.to_ascii_lowercase().hash(state);
            }
            DocumentId::Opaque(value) => {
                1u8.hash(state);
                value.to_string().hash(state);
            }
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Hex(hex) | DocumentId::Wrapped(hex) => f.write_str(hex),
            DocumentId::Opaque(value) => write!(f, "{value}"),
        }
    }
}

/// Exactly 24 ASCII hex digits.
pub fn is_object_id_hex(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Canonicalize a single identifier value.
///
/// Bare hex strings are wrapped; everything else (including values that are
/// already wrapped) is returned unchanged. Never fails.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) if is_object_id_hex(s) => json!({ OID_KEY: s }),
        other => other.clone(),
    }
}

/// Canonicalize the `_id` clause of a query.
///
/// Handles a scalar identifier, an array of identifiers and the operand of
/// `$in`. Other fields and other operators are left as they are.
pub fn normalize_query(query: &Map<String, Value>) -> Map<String, Value> {
    let mut out = query.clone();
    if let Some(id) = out.get_mut("_id") {
        *id = normalize_id_clause(id);
    }
    out
}

fn normalize_id_clause(clause: &Value) -> Value {
    match clause {
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(ops) if ops.contains_key("$in") => {
            let mut ops = ops.clone();
            if let Some(Value::Array(items)) = ops.get_mut("$in") {
                for item in items.iter_mut() {
                    *item = normalize_value(item);
                }
            }
            Value::Object(ops)
        }
        other => normalize_value(other),
    }
}

/// A query matching exactly the given identifiers: `{"_id": {"$in": [...]}}`.
pub fn id_in_query(ids: &[DocumentId]) -> Map<String, Value> {
    let values: Vec<Value> = ids.iter().map(DocumentId::normalized).collect();
    let mut query = Map::new();
    query.insert("_id".to_string(), json!({ "$in": values }));
    query
}
