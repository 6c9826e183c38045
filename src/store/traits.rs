//! `KeyValueStore` trait: the local persistent store the client keeps its
//! token and validation flags in.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Fixed keys used by the session and the validation cache.
pub mod keys {
    /// Stored credentials (`{access_token, refresh_token}`).
    pub const TOKEN: &str = "TOKEN";
    /// Cached result of the "profile completed?" check.
    pub const PROFILE_COMPLETED: &str = "PROFILE_COMPLETED";
    /// Cached result of the "terms accepted?" check.
    pub const TERMS_ACCEPTED: &str = "TERMS_ACCEPTED";
}

/// Backend-agnostic JSON key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the JSON value stored under `key`, if any.
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError>;

    /// Remove `key`. Returns whether a value was present.
    async fn remove_item(&self, key: &str) -> Result<bool, StorageError>;
}

/// Read and decode a typed value. A value that fails to decode is an error,
/// not an absence.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get_value(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Encode and store a typed value.
pub async fn set_json<T: Serialize + Sync + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let value = serde_json::to_value(value)
        .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))?;
    store.set_value(key, &value).await
}
