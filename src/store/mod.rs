//! Persistence layer: the local key-value store for token and validation flags.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::{KeyValueStore, get_json, keys, set_json};
