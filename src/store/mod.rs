//! The database boundary: count, fetch identifiers and delete by identifier
//! over a single collection.

mod error;
mod memory;
#[cfg(feature = "mongo")]
mod mongo;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::{MongoConnector, MongoStore};
pub use traits::{DocumentStore, Filter, StoreConnector};
