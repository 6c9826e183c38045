//! Permission gate: decides whether the current user may open a route.
//!
//! Routes are matched against the backend's screen catalog: an exact route
//! match first, otherwise the longest non-root route prefixing the path. A
//! matched screen is only allowed when the session's permissions contain its
//! id. Administrators, anonymous users and unregistered routes pass.

pub mod model;

pub use model::{Screen, match_screen, strip_query};

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::http::endpoints;
use crate::api::{RemoteApi, bounded};
use crate::config::GateConfig;
use crate::error::ApiError;
use crate::navigation::{NavigateOptions, Navigator};
use crate::session::{Session, SessionResolver};

/// Why a route was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    /// No session; unauthenticated routes gate themselves.
    Anonymous,
    Administrator,
    /// Catalog could not be loaded and the gate is configured fail-open.
    MetadataUnavailable,
    /// No screen governs the path.
    Unregistered,
    Permitted,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateDecision {
    Allow { reason: AllowReason },
    Deny { redirect: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Screen catalog fetched for one session.
struct CachedCatalog {
    session_id: Uuid,
    screens: Arc<Vec<Screen>>,
}

pub struct PermissionGate {
    api: Arc<dyn RemoteApi>,
    sessions: Arc<SessionResolver>,
    navigator: Arc<dyn Navigator>,
    config: GateConfig,
    catalog: RwLock<Option<CachedCatalog>>,
}

impl PermissionGate {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        sessions: Arc<SessionResolver>,
        navigator: Arc<dyn Navigator>,
        config: GateConfig,
    ) -> Self {
        Self {
            api,
            sessions,
            navigator,
            config,
            catalog: RwLock::new(None),
        }
    }

    /// Decide on `path` without side effects.
    pub async fn check(&self, path: &str) -> GateDecision {
        let Some(session) = self.sessions.current() else {
            return GateDecision::Allow {
                reason: AllowReason::Anonymous,
            };
        };

        if session.has_role(&self.config.admin_role) {
            return GateDecision::Allow {
                reason: AllowReason::Administrator,
            };
        }

        let screens = match self.screens(&session).await {
            Ok(screens) => screens,
            Err(e) if self.config.fail_open_on_missing_metadata => {
                debug!(error = %e, path, "Screen catalog unavailable; allowing");
                return GateDecision::Allow {
                    reason: AllowReason::MetadataUnavailable,
                };
            }
            Err(e) => {
                warn!(error = %e, path, "Screen catalog unavailable; denying");
                return self.deny();
            }
        };

        match match_screen(&screens, path) {
            None => GateDecision::Allow {
                reason: AllowReason::Unregistered,
            },
            Some(screen) if session.can_open(screen.id) => GateDecision::Allow {
                reason: AllowReason::Permitted,
            },
            Some(_) => self.deny(),
        }
    }

    /// Route guard entry point. On deny, sends the user to the access-denied
    /// screen.
    pub async fn can_activate(&self, path: &str) -> bool {
        match self.check(path).await {
            GateDecision::Allow { .. } => true,
            GateDecision::Deny { redirect } => {
                warn!(
                    path,
                    user_id = %self.sessions.current().map(|s| s.user_id).unwrap_or_default(),
                    "Access denied"
                );
                if let Err(e) = self
                    .navigator
                    .navigate(&redirect, NavigateOptions::replace())
                    .await
                {
                    warn!(error = %e, "Failed to navigate to access-denied screen");
                }
                false
            }
        }
    }

    /// The screen catalog, fetched once per session.
    pub async fn screens(&self, session: &Session) -> Result<Arc<Vec<Screen>>, ApiError> {
        if let Some(cached) = self.catalog.read().await.as_ref()
            && cached.session_id == session.session_id
        {
            return Ok(Arc::clone(&cached.screens));
        }

        let screens = bounded(
            endpoints::ACCESSIBLE_SCREENS,
            self.config.remote_timeout,
            self.api.accessible_screens(&session.credentials),
        )
        .await?;
        let screens = Arc::new(screens);
        debug!(count = screens.len(), session_id = %session.session_id, "Screen catalog loaded");

        *self.catalog.write().await = Some(CachedCatalog {
            session_id: session.session_id,
            screens: Arc::clone(&screens),
        });
        Ok(screens)
    }

    /// Route of the first catalog screen `session` may open.
    pub async fn first_permitted_route(
        &self,
        session: &Session,
    ) -> Result<Option<String>, ApiError> {
        let is_admin = session.has_role(&self.config.admin_role);
        let screens = self.screens(session).await?;
        Ok(screens
            .iter()
            .find(|s| is_admin || session.can_open(s.id))
            .map(|s| s.route.clone()))
    }

    /// Drop the cached catalog.
    pub async fn invalidate(&self) {
        *self.catalog.write().await = None;
    }

    fn deny(&self) -> GateDecision {
        GateDecision::Deny {
            redirect: self.config.paths.access_denied.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::navigation::HistoryNavigator;
    use crate::store::MemoryStore;
    use crate::testing::StubApi;

    fn catalog() -> Vec<Screen> {
        vec![
            Screen::new(1, "/reservas"),
            Screen::new(2, "/pagos"),
            Screen::new(3, "/admin/usuarios"),
        ]
    }

    struct Harness {
        api: Arc<StubApi>,
        sessions: Arc<SessionResolver>,
        nav: Arc<HistoryNavigator>,
        gate: PermissionGate,
    }

    fn harness(api: StubApi, config: GateConfig) -> Harness {
        let api = Arc::new(api);
        let sessions = Arc::new(SessionResolver::new(
            api.clone(),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(1),
        ));
        let nav = Arc::new(HistoryNavigator::new());
        let gate = PermissionGate::new(api.clone(), sessions.clone(), nav.clone(), config);
        Harness {
            api,
            sessions,
            nav,
            gate,
        }
    }

    #[tokio::test]
    async fn anonymous_users_pass() {
        let h = harness(StubApi::new().with_screens(catalog()), GateConfig::default());
        assert!(h.gate.can_activate("/admin/usuarios").await);
        assert_eq!(h.api.calls("accessible_screens"), 0);
    }

    #[tokio::test]
    async fn administrators_pass_everywhere() {
        let h = harness(
            StubApi::new()
                .with_role(crate::config::DEFAULT_ADMIN_ROLE)
                .with_screens(catalog()),
            GateConfig::default(),
        );
        h.sessions.login_with_code("abc").await.unwrap();

        for path in ["/admin/usuarios", "/pagos/3", "/no-registrada"] {
            assert_eq!(
                h.gate.check(path).await,
                GateDecision::Allow {
                    reason: AllowReason::Administrator
                }
            );
        }
        assert!(h.nav.entries().is_empty());
    }

    #[tokio::test]
    async fn permitted_screen_passes() {
        let h = harness(
            StubApi::new().with_permissions(&[1]).with_screens(catalog()),
            GateConfig::default(),
        );
        h.sessions.login_with_code("abc").await.unwrap();

        assert!(h.gate.can_activate("/reservas/15").await);
        assert!(h.nav.entries().is_empty());
    }

    #[tokio::test]
    async fn missing_permission_denies_and_redirects_once() {
        let h = harness(
            StubApi::new().with_permissions(&[1]).with_screens(catalog()),
            GateConfig::default(),
        );
        h.sessions.login_with_code("abc").await.unwrap();

        assert!(!h.gate.can_activate("/pagos").await);
        assert_eq!(h.nav.count("/acceso-denegado"), 1);
        assert!(h.nav.entries()[0].replace);

        assert!(!h.gate.can_activate("/pagos/9").await);
        assert_eq!(h.nav.count("/acceso-denegado"), 2);
    }

    #[tokio::test]
    async fn unregistered_routes_pass() {
        let h = harness(StubApi::new().with_screens(catalog()), GateConfig::default());
        h.sessions.login_with_code("abc").await.unwrap();

        assert_eq!(
            h.gate.check("/perfil").await,
            GateDecision::Allow {
                reason: AllowReason::Unregistered
            }
        );
    }

    #[tokio::test]
    async fn missing_catalog_fails_open_by_default() {
        let h = harness(StubApi::new().without_screens(), GateConfig::default());
        h.sessions.login_with_code("abc").await.unwrap();

        assert_eq!(
            h.gate.check("/pagos").await,
            GateDecision::Allow {
                reason: AllowReason::MetadataUnavailable
            }
        );
    }

    #[tokio::test]
    async fn missing_catalog_denies_when_fail_closed() {
        let config = GateConfig {
            fail_open_on_missing_metadata: false,
            ..GateConfig::default()
        };
        let h = harness(StubApi::new().without_screens(), config);
        h.sessions.login_with_code("abc").await.unwrap();

        assert!(!h.gate.can_activate("/pagos").await);
        assert_eq!(h.nav.last_path().as_deref(), Some("/acceso-denegado"));
    }

    #[tokio::test]
    async fn catalog_is_fetched_once_per_session() {
        let h = harness(
            StubApi::new().with_permissions(&[1, 2]).with_screens(catalog()),
            GateConfig::default(),
        );
        h.sessions.login_with_code("abc").await.unwrap();

        h.gate.check("/reservas").await;
        h.gate.check("/pagos").await;
        assert_eq!(h.api.calls("accessible_screens"), 1);

        // A new session refetches.
        h.sessions.login_with_code("def").await.unwrap();
        h.gate.check("/reservas").await;
        assert_eq!(h.api.calls("accessible_screens"), 2);

        h.gate.invalidate().await;
        h.gate.check("/reservas").await;
        assert_eq!(h.api.calls("accessible_screens"), 3);
    }

    #[tokio::test]
    async fn first_permitted_route_follows_catalog_order() {
        let h = harness(
            StubApi::new().with_permissions(&[3, 2]).with_screens(catalog()),
            GateConfig::default(),
        );
        let session = h.sessions.login_with_code("abc").await.unwrap();
        assert_eq!(
            h.gate.first_permitted_route(&session).await.unwrap().as_deref(),
            Some("/pagos")
        );
    }

    #[tokio::test]
    async fn first_permitted_route_is_none_without_permissions() {
        let h = harness(StubApi::new().with_screens(catalog()), GateConfig::default());
        let session = h.sessions.login_with_code("abc").await.unwrap();
        assert!(h.gate.first_permitted_route(&session).await.unwrap().is_none());
    }
}
