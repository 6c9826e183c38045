//! Validation cache: locally persisted copies of the "terms accepted" and
//! "profile completed" checks.
//!
//! The flags are a cache of backend truth, never authoritative. Each is its
//! own key in the store; a crash between two writes can leave one stale, which
//! is tolerated because a cold cache forces a fresh remote check.

use std::sync::Arc;

use tracing::warn;

use crate::store::{KeyValueStore, get_json, keys, set_json};

pub struct ValidationCache {
    store: Arc<dyn KeyValueStore>,
}

impl ValidationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Cached terms flag; `None` when never recorded or unreadable.
    pub async fn terms_accepted(&self) -> Option<bool> {
        self.read(keys::TERMS_ACCEPTED).await
    }

    pub async fn set_terms_accepted(&self, accepted: bool) {
        self.write(keys::TERMS_ACCEPTED, accepted).await;
    }

    /// Cached profile flag; `None` when never recorded or unreadable.
    pub async fn profile_completed(&self) -> Option<bool> {
        self.read(keys::PROFILE_COMPLETED).await
    }

    pub async fn set_profile_completed(&self, completed: bool) {
        self.write(keys::PROFILE_COMPLETED, completed).await;
    }

    /// True when neither flag has been recorded: the user just came through
    /// login and the backend has to be asked.
    pub async fn is_coming_from_login(&self) -> bool {
        self.terms_accepted().await.is_none() && self.profile_completed().await.is_none()
    }

    /// True when both flags are present.
    pub async fn has_valid_state(&self) -> bool {
        self.terms_accepted().await.is_some() && self.profile_completed().await.is_some()
    }

    /// Forget both flags. Best effort.
    pub async fn clear(&self) {
        for key in [keys::TERMS_ACCEPTED, keys::PROFILE_COMPLETED] {
            if let Err(e) = self.store.remove_item(key).await {
                warn!(key, error = %e, "Failed to clear validation flag");
            }
        }
    }

    async fn read(&self, key: &str) -> Option<bool> {
        match get_json::<bool>(self.store.as_ref(), key).await {
            Ok(flag) => flag,
            Err(e) => {
                warn!(key, error = %e, "Failed to read validation flag; treating as unknown");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: bool) {
        if let Err(e) = set_json(self.store.as_ref(), key, &value).await {
            warn!(key, value, error = %e, "Failed to write validation flag");
        }
    }
}
