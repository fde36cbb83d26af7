//! Target database configuration.
//!
//! # Example
//!
//! ```toml
//! [mongodb]
//! uri = "mongodb://db1:27017"
//! namespace = ["sales", "orders"]
//! filter = { status = "closed" }
//! env = "prod-eu"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ConfigError;

/// Connection target, namespace and archival filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MongoConfig {
    /// Connection string. Mandatory.
    #[serde(default)]
    pub uri: Option<String>,

    /// `"db.collection"` or `["db", "collection"]`. Mandatory.
    #[serde(default)]
    pub namespace: Option<NamespaceSpec>,

    /// Query predicate selecting documents to archive. Mandatory.
    /// Either a JSON string or an inline table.
    #[serde(default)]
    pub filter: Option<FilterSpec>,

    /// Human-readable label for the target, used in notifications.
    #[serde(default)]
    pub env: Option<String>,
}

/// Namespace as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamespaceSpec {
    /// `"db.collection"`; the collection part may itself contain dots.
    Dotted(String),
    /// `["db", "collection"]`.
    Parts(Vec<String>),
}

/// A resolved (database, collection) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

impl NamespaceSpec {
    /// Split into exactly one database and one collection.
    pub fn resolve(&self) -> Result<Namespace, ConfigError> {
        let (database, collection) = match self {
            NamespaceSpec::Dotted(s) => s.split_once('.').ok_or_else(|| {
                ConfigError::Validation(
                    "mongodb.namespace string must be \"db.collection\"".into(),
                )
            })?,
            NamespaceSpec::Parts(parts) => match parts.as_slice() {
                [db, coll] => (db.as_str(), coll.as_str()),
                _ => {
                    return Err(ConfigError::Validation(
                        "mongodb.namespace array must be [db, collection]".into(),
                    ));
                }
            },
        };

        if database.trim().is_empty() || collection.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mongodb.namespace database and collection must be non-empty".into(),
            ));
        }

        Ok(Namespace {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }
}

/// Filter as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    /// A JSON document in a string, e.g. `'{"status": "closed"}'`.
    Json(String),
    /// An inline TOML table.
    Table(Map<String, Value>),
}

impl FilterSpec {
    /// An empty string counts as "not configured".
    pub fn is_blank(&self) -> bool {
        matches!(self, FilterSpec::Json(s) if s.trim().is_empty())
    }

    /// Parse into a predicate object.
    pub fn to_predicate(&self) -> Result<Map<String, Value>, ConfigError> {
        match self {
            FilterSpec::Table(map) => Ok(map.clone()),
            FilterSpec::Json(raw) => {
                let value: Value = serde_json::from_str(raw).map_err(|e| {
                    ConfigError::Validation(format!(
                        "mongodb.filter must be a valid JSON string: {e}"
                    ))
                })?;
                match value {
                    Value::Object(map) => Ok(map),
                    other => Err(ConfigError::Validation(format!(
                        "mongodb.filter must be a JSON object, got {}",
                        json_kind(&other)
                    ))),
                }
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
