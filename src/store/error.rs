use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
