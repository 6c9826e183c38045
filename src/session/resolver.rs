//! Session resolver: owns the authenticated session and publishes it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::model::{Credentials, Session, StoredToken};
use crate::api::{RemoteApi, bounded};
use crate::api::http::endpoints;
use crate::error::ApiError;
use crate::store::{KeyValueStore, get_json, keys, set_json};

/// Owns the single [`Session`]. Consumers read it through [`current`] or
/// watch it through [`subscribe`]; only the resolver mutates it.
///
/// [`current`]: SessionResolver::current
/// [`subscribe`]: SessionResolver::subscribe
pub struct SessionResolver {
    api: Arc<dyn RemoteApi>,
    store: Arc<dyn KeyValueStore>,
    timeout: Duration,
    state: watch::Sender<Option<Session>>,
}

impl SessionResolver {
    pub fn new(api: Arc<dyn RemoteApi>, store: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            api,
            store,
            timeout,
            state,
        }
    }

    /// Watch session changes (login, refresh, logout).
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Exchange an authorization code and establish a session from it.
    pub async fn login_with_code(&self, code: &str) -> Result<Session, ApiError> {
        let credentials =
            bounded(endpoints::TOKEN, self.timeout, self.api.exchange_code(code)).await?;
        self.establish(credentials).await
    }

    /// Fetch the identity behind `credentials`, persist the token and publish
    /// the new session.
    pub async fn establish(&self, credentials: Credentials) -> Result<Session, ApiError> {
        let identity =
            bounded(endpoints::ME, self.timeout, self.api.current_user(&credentials)).await?;

        if let Err(e) = set_json(
            self.store.as_ref(),
            keys::TOKEN,
            &StoredToken::from(&credentials),
        )
        .await
        {
            warn!(error = %e, "Failed to persist token; session will not survive a restart");
        }

        let session = Session::new(identity, credentials);
        info!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            role = %session.role,
            "Session established"
        );
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Rebuild the session from a stored token, if there is one.
    ///
    /// A token the backend rejects is discarded. Storage errors count as "no
    /// token".
    pub async fn restore(&self) -> Result<Option<Session>, ApiError> {
        let stored: Option<StoredToken> = match get_json(self.store.as_ref(), keys::TOKEN).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                None
            }
        };
        let Some(stored) = stored else {
            return Ok(None);
        };

        match self.establish(stored.into()).await {
            Ok(session) => Ok(Some(session)),
            Err(ApiError::Status { status: 401, .. }) => {
                info!("Stored token rejected; discarding it");
                self.forget_token().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-fetch the identity of the current session.
    pub async fn refresh(&self) -> Result<Option<Session>, ApiError> {
        let Some(credentials) = self.current().map(|s| s.credentials) else {
            return Ok(None);
        };
        let identity =
            bounded(endpoints::ME, self.timeout, self.api.current_user(&credentials)).await?;

        let mut refreshed = None;
        self.state.send_if_modified(|state| match state {
            Some(session) => {
                session.apply_identity(identity);
                refreshed = Some(session.clone());
                true
            }
            // Logged out while the fetch was in flight.
            None => false,
        });
        Ok(refreshed)
    }

    /// Apply a local change to the current session. Returns false when there
    /// is no session.
    pub fn update(&self, change: impl FnOnce(&mut Session)) -> bool {
        self.state.send_if_modified(|state| match state {
            Some(session) => {
                change(session);
                true
            }
            None => false,
        })
    }

    /// End the session: tell the backend (best effort), drop the stored token
    /// and publish `None`.
    pub async fn logout(&self) {
        let Some(session) = self.current() else {
            self.forget_token().await;
            return;
        };

        if let Err(e) = bounded(
            endpoints::LOGOUT,
            self.timeout,
            self.api.logout(&session.credentials),
        )
        .await
        {
            warn!(error = %e, "Backend logout failed; clearing local session anyway");
        }

        self.forget_token().await;
        self.state.send_replace(None);
        info!(session_id = %session.session_id, "Session cleared");
    }

    async fn forget_token(&self) {
        if let Err(e) = self.store.remove_item(keys::TOKEN).await {
            warn!(error = %e, "Failed to remove stored token");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::StubApi;

    fn resolver(api: Arc<StubApi>, store: Arc<MemoryStore>) -> SessionResolver {
        SessionResolver::new(api, store, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn login_persists_token_and_publishes_session() {
        let api = Arc::new(StubApi::new());
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver(api.clone(), store.clone());
        let mut rx = resolver.subscribe();

        let session = resolver.login_with_code("abc").await.unwrap();
        assert_eq!(session.user_id, "u-1");
        assert!(resolver.is_authenticated());

        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().as_ref().map(|s| s.session_id),
            Some(session.session_id)
        );

        let stored: Option<StoredToken> = get_json(store.as_ref(), keys::TOKEN).await.unwrap();
        assert_eq!(stored.unwrap().access_token, "token-abc");
    }

    #[tokio::test]
    async fn restore_without_token_is_anonymous() {
        let api = Arc::new(StubApi::new());
        let resolver = resolver(api.clone(), Arc::new(MemoryStore::new()));

        assert!(resolver.restore().await.unwrap().is_none());
        assert_eq!(api.calls("current_user"), 0);
    }

    #[tokio::test]
    async fn restore_discards_rejected_token() {
        let api = Arc::new(StubApi::new().rejecting_tokens());
        let store = Arc::new(MemoryStore::new());
        set_json(
            store.as_ref(),
            keys::TOKEN,
            &StoredToken {
                access_token: "stale".into(),
                refresh_token: None,
            },
        )
        .await
        .unwrap();

        let resolver = resolver(api, store.clone());
        assert!(resolver.restore().await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn logout_clears_everything_even_when_backend_fails() {
        let api = Arc::new(StubApi::new().failing_logout());
        let store = Arc::new(MemoryStore::new());
        let resolver = resolver(api.clone(), store.clone());
        resolver.login_with_code("abc").await.unwrap();

        resolver.logout().await;
        assert!(!resolver.is_authenticated());
        assert!(store.is_empty().await);
        assert_eq!(api.calls("logout"), 1);
    }

    #[tokio::test]
    async fn refresh_keeps_session_id() {
        let api = Arc::new(StubApi::new());
        let resolver = resolver(api.clone(), Arc::new(MemoryStore::new()));
        let first = resolver.login_with_code("abc").await.unwrap();

        api.set_terms(true);
        let refreshed = resolver.refresh().await.unwrap().unwrap();
        assert_eq!(refreshed.session_id, first.session_id);
        assert!(refreshed.terms_accepted);
    }

    #[tokio::test]
    async fn update_without_session_is_a_no_op() {
        let resolver = resolver(Arc::new(StubApi::new()), Arc::new(MemoryStore::new()));
        assert!(!resolver.update(|s| s.terms_accepted = true));
    }
}
