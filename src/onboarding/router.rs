//! Post-login router: decides where a user lands after authenticating.
//!
//! Order of checks, first match wins:
//!
//! 1. no authorization code → login
//! 2. code exchange fails → login
//! 3. terms not accepted → terms screen
//! 4. profile not completed → profile screen
//! 5. non-root return URL → return URL
//! 6. first screen the user may open, or the fallback screen
//!
//! Any failure after the code is present lands on login as well.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::cache::ValidationCache;
use crate::api::http::endpoints;
use crate::api::{RemoteApi, bounded};
use crate::config::{GateConfig, ScreenPaths};
use crate::error::ApiError;
use crate::gate::PermissionGate;
use crate::navigation::{NavigateOptions, Navigator};
use crate::session::{Session, SessionResolver};

/// Query parameters of the authentication callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    #[serde(rename = "returnUrl", alias = "return_url")]
    pub return_url: Option<String>,
}

impl CallbackParams {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            return_url: None,
        }
    }

    pub fn with_return_url(mut self, return_url: impl Into<String>) -> Self {
        self.return_url = Some(return_url.into());
        self
    }
}

/// Where the user is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Destination {
    Login,
    Terms,
    Profile,
    ReturnUrl(String),
    FirstAvailable(String),
    Default,
}

impl Destination {
    pub fn path<'a>(&'a self, paths: &'a ScreenPaths) -> &'a str {
        match self {
            Self::Login => &paths.login,
            Self::Terms => &paths.terms,
            Self::Profile => &paths.profile,
            Self::ReturnUrl(path) | Self::FirstAvailable(path) => path,
            Self::Default => &paths.fallback,
        }
    }
}

/// Why a login flow ended on the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailure {
    MissingCode,
    ExchangeFailed,
    CheckFailed,
    Timeout,
    NavigationFailed,
}

/// Result of one routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub destination: Destination,
    /// The path actually navigated to.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<LoginFailure>,
}

/// Results of the onboarding checks. `profile_completed` is `None` when the
/// profile check was skipped because terms are still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OnboardingChecks {
    pub terms_accepted: bool,
    pub profile_completed: Option<bool>,
}

impl OnboardingChecks {
    pub fn is_complete(&self) -> bool {
        self.terms_accepted && self.profile_completed == Some(true)
    }
}

/// Snapshot for the onboarding status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub cached_terms_accepted: Option<bool>,
    pub cached_profile_completed: Option<bool>,
    pub coming_from_login: bool,
}

/// A return URL that should be honored: present, non-blank and not the root.
pub fn effective_return_url(return_url: Option<&str>) -> Option<&str> {
    return_url
        .map(str::trim)
        .filter(|url| !url.is_empty() && *url != "/")
}

/// The destination decision. `first_screen` is only consulted once both
/// onboarding gates pass and no return URL applies.
pub fn decide(
    checks: OnboardingChecks,
    return_url: Option<&str>,
    first_screen: Option<String>,
) -> Destination {
    if !checks.terms_accepted {
        return Destination::Terms;
    }
    if checks.profile_completed != Some(true) {
        return Destination::Profile;
    }
    if let Some(url) = effective_return_url(return_url) {
        return Destination::ReturnUrl(url.to_string());
    }
    match first_screen {
        Some(route) => Destination::FirstAvailable(route),
        None => Destination::Default,
    }
}

pub struct PostLoginRouter {
    api: Arc<dyn RemoteApi>,
    sessions: Arc<SessionResolver>,
    cache: Arc<ValidationCache>,
    gate: Arc<PermissionGate>,
    navigator: Arc<dyn Navigator>,
    config: GateConfig,
}

impl PostLoginRouter {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        sessions: Arc<SessionResolver>,
        cache: Arc<ValidationCache>,
        gate: Arc<PermissionGate>,
        navigator: Arc<dyn Navigator>,
        config: GateConfig,
    ) -> Self {
        Self {
            api,
            sessions,
            cache,
            gate,
            navigator,
            config,
        }
    }

    /// Handle the authentication callback and navigate to the outcome.
    pub async fn handle_callback(&self, params: &CallbackParams) -> LoginOutcome {
        let (destination, failure) = self.resolve(params).await;
        self.finish(destination, failure).await
    }

    /// Compute the callback destination without navigating.
    pub async fn resolve(&self, params: &CallbackParams) -> (Destination, Option<LoginFailure>) {
        let Some(code) = params
            .code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            warn!("Authentication callback without code");
            return (Destination::Login, Some(LoginFailure::MissingCode));
        };

        let session = match self.sessions.login_with_code(code).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Authorization code exchange failed");
                return (Destination::Login, Some(failure_for(&e, LoginFailure::ExchangeFailed)));
            }
        };

        // Flags left by an earlier session belong to whoever held it.
        self.cache.clear().await;

        match self
            .destination_for(&session, params.return_url.as_deref())
            .await
        {
            Ok(destination) => (destination, None),
            Err(e) => {
                error!(error = %e, session_id = %session.session_id, "Post-login checks failed");
                (Destination::Login, Some(failure_for(&e, LoginFailure::CheckFailed)))
            }
        }
    }

    /// Re-run the checks for the current session and navigate.
    pub async fn next_destination(&self, return_url: Option<&str>) -> LoginOutcome {
        let Some(session) = self.sessions.current() else {
            return self.finish(Destination::Login, None).await;
        };
        match self.destination_for(&session, return_url).await {
            Ok(destination) => self.finish(destination, None).await,
            Err(e) => {
                error!(error = %e, session_id = %session.session_id, "Onboarding checks failed");
                let failure = failure_for(&e, LoginFailure::CheckFailed);
                self.finish(Destination::Login, Some(failure)).await
            }
        }
    }

    /// Record terms acceptance with the backend, then move on.
    pub async fn accept_terms(&self, return_url: Option<&str>) -> Result<LoginOutcome, ApiError> {
        let session = self.sessions.current().ok_or(ApiError::Unauthenticated)?;
        bounded(
            endpoints::TERMS,
            self.config.remote_timeout,
            self.api.accept_terms(&session.credentials),
        )
        .await?;

        self.cache.set_terms_accepted(true).await;
        self.sessions.update(|s| s.terms_accepted = true);
        info!(session_id = %session.session_id, "Terms accepted");

        Ok(self.next_destination(return_url).await)
    }

    /// Confirm with the backend that the profile form was saved, then move on.
    /// When the backend still reports it incomplete the user stays on the
    /// profile screen.
    pub async fn complete_profile(
        &self,
        return_url: Option<&str>,
    ) -> Result<LoginOutcome, ApiError> {
        let session = self.sessions.current().ok_or(ApiError::Unauthenticated)?;
        let completed = bounded(
            endpoints::PROFILE_COMPLETED,
            self.config.remote_timeout,
            self.api.profile_completed(&session.credentials),
        )
        .await?;

        if !completed {
            warn!(session_id = %session.session_id, "Profile still incomplete");
            return Ok(self.finish(Destination::Profile, None).await);
        }

        self.cache.set_profile_completed(true).await;
        self.sessions.update(|s| s.profile_completed = true);
        info!(session_id = %session.session_id, "Profile completed");

        Ok(self.next_destination(return_url).await)
    }

    /// End the session, forget cached flags and catalog, go to login.
    pub async fn logout(&self) -> LoginOutcome {
        self.sessions.logout().await;
        self.cache.clear().await;
        self.gate.invalidate().await;
        self.finish(Destination::Login, None).await
    }

    pub async fn status(&self) -> OnboardingStatus {
        let session = self.sessions.current();
        OnboardingStatus {
            authenticated: session.is_some(),
            user_id: session.map(|s| s.user_id),
            cached_terms_accepted: self.cache.terms_accepted().await,
            cached_profile_completed: self.cache.profile_completed().await,
            coming_from_login: self.cache.is_coming_from_login().await,
        }
    }

    /// Run the terms and profile checks. A flag cached as `true` skips its
    /// remote check, but only while both flags are cached.
    pub async fn onboarding_checks(&self, session: &Session) -> Result<OnboardingChecks, ApiError> {
        let warm = self.cache.has_valid_state().await;
        debug!(session_id = %session.session_id, warm, "Running onboarding checks");

        let cached_terms = if warm {
            self.cache.terms_accepted().await
        } else {
            None
        };
        let terms_accepted = match cached_terms {
            Some(true) => true,
            _ => {
                let accepted = bounded(
                    endpoints::TERMS,
                    self.config.remote_timeout,
                    self.api.terms_accepted(&session.credentials),
                )
                .await?;
                // A pending answer is not cached; it is rechecked next time.
                if accepted {
                    self.cache.set_terms_accepted(true).await;
                }
                accepted
            }
        };

        if !terms_accepted {
            return Ok(OnboardingChecks {
                terms_accepted,
                profile_completed: None,
            });
        }

        let cached_profile = if warm {
            self.cache.profile_completed().await
        } else {
            None
        };
        let profile_completed = match cached_profile {
            Some(true) => true,
            _ => {
                let completed = bounded(
                    endpoints::PROFILE_COMPLETED,
                    self.config.remote_timeout,
                    self.api.profile_completed(&session.credentials),
                )
                .await?;
                if completed {
                    self.cache.set_profile_completed(true).await;
                }
                completed
            }
        };

        Ok(OnboardingChecks {
            terms_accepted,
            profile_completed: Some(profile_completed),
        })
    }

    async fn destination_for(
        &self,
        session: &Session,
        return_url: Option<&str>,
    ) -> Result<Destination, ApiError> {
        let checks = self.onboarding_checks(session).await?;
        self.sessions.update(|s| {
            s.terms_accepted = checks.terms_accepted;
            if let Some(completed) = checks.profile_completed {
                s.profile_completed = completed;
            }
        });

        let first_screen = if checks.is_complete() && effective_return_url(return_url).is_none() {
            self.gate.first_permitted_route(session).await?
        } else {
            None
        };

        Ok(decide(checks, return_url, first_screen))
    }

    /// Navigate to `destination`; a destination that cannot be navigated to
    /// falls back to login.
    async fn finish(&self, destination: Destination, failure: Option<LoginFailure>) -> LoginOutcome {
        let path = destination.path(&self.config.paths).to_string();
        match self
            .navigator
            .navigate(&path, NavigateOptions::replace())
            .await
        {
            Ok(()) => {
                info!(path = %path, failure = ?failure, "Routed after login");
                LoginOutcome {
                    destination,
                    path,
                    failure,
                }
            }
            Err(e) if destination != Destination::Login => {
                error!(error = %e, path = %path, "Navigation failed; falling back to login");
                let login = self.config.paths.login.clone();
                if let Err(e) = self
                    .navigator
                    .navigate(&login, NavigateOptions::replace())
                    .await
                {
                    error!(error = %e, "Navigation to login failed");
                }
                LoginOutcome {
                    destination: Destination::Login,
                    path: login,
                    failure: Some(LoginFailure::NavigationFailed),
                }
            }
            Err(e) => {
                error!(error = %e, "Navigation to login failed");
                LoginOutcome {
                    destination,
                    path,
                    failure: failure.or(Some(LoginFailure::NavigationFailed)),
                }
            }
        }
    }
}

fn failure_for(error: &ApiError, otherwise: LoginFailure) -> LoginFailure {
    if error.is_timeout() {
        LoginFailure::Timeout
    } else {
        otherwise
    }
}
