//! In-crate test doubles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::api::RemoteApi;
use crate::error::ApiError;
use crate::gate::Screen;
use crate::session::{Credentials, ScreenId, UserIdentity};

/// Scriptable backend that counts calls per endpoint.
pub(crate) struct StubApi {
    terms: AtomicBool,
    profile: AtomicBool,
    role: String,
    permissions: Vec<ScreenId>,
    screens: Option<Vec<Screen>>,
    fail_exchange: bool,
    fail_checks: AtomicBool,
    reject_tokens: bool,
    fail_logout: bool,
    delay: Option<Duration>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl StubApi {
    pub(crate) fn new() -> Self {
        Self {
            terms: AtomicBool::new(false),
            profile: AtomicBool::new(false),
            role: "ESTUDIANTE".to_string(),
            permissions: Vec::new(),
            screens: Some(Vec::new()),
            fail_exchange: false,
            fail_checks: AtomicBool::new(false),
            reject_tokens: false,
            fail_logout: false,
            delay: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn onboarded(self) -> Self {
        self.set_terms(true);
        self.set_profile(true);
        self
    }

    pub(crate) fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    pub(crate) fn with_permissions(mut self, permissions: &[ScreenId]) -> Self {
        self.permissions = permissions.to_vec();
        self
    }

    pub(crate) fn with_screens(mut self, screens: Vec<Screen>) -> Self {
        self.screens = Some(screens);
        self
    }

    /// Make the screen catalog endpoint fail.
    pub(crate) fn without_screens(mut self) -> Self {
        self.screens = None;
        self
    }

    pub(crate) fn failing_exchange(mut self) -> Self {
        self.fail_exchange = true;
        self
    }

    pub(crate) fn rejecting_tokens(mut self) -> Self {
        self.reject_tokens = true;
        self
    }

    pub(crate) fn failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    /// Delay every terms/profile check by `delay`.
    pub(crate) fn with_slow_checks(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_terms(&self, accepted: bool) {
        self.terms.store(accepted, Ordering::SeqCst);
    }

    pub(crate) fn set_profile(&self, completed: bool) {
        self.profile.store(completed, Ordering::SeqCst);
    }

    pub(crate) fn set_failing_checks(&self, failing: bool) {
        self.fail_checks.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, endpoint: &'static str) {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
    }

    async fn check_flag(&self, endpoint: &'static str, flag: &AtomicBool) -> Result<bool, ApiError> {
        self.record(endpoint);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_checks.load(Ordering::SeqCst) {
            return Err(ApiError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(flag.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl RemoteApi for StubApi {
    async fn exchange_code(&self, code: &str) -> Result<Credentials, ApiError> {
        self.record("exchange_code");
        if self.fail_exchange {
            return Err(ApiError::Status {
                endpoint: "/auth/token".to_string(),
                status: 400,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(Credentials::new(format!("token-{code}")))
    }

    async fn current_user(&self, _credentials: &Credentials) -> Result<UserIdentity, ApiError> {
        self.record("current_user");
        if self.reject_tokens {
            return Err(ApiError::Status {
                endpoint: "/auth/me".to_string(),
                status: 401,
                message: "token inválido".to_string(),
            });
        }
        Ok(UserIdentity {
            user_id: "u-1".to_string(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
            profile_completed: self.profile.load(Ordering::SeqCst),
            terms_accepted: self.terms.load(Ordering::SeqCst),
        })
    }

    async fn terms_accepted(&self, _credentials: &Credentials) -> Result<bool, ApiError> {
        self.check_flag("terms_accepted", &self.terms).await
    }

    async fn accept_terms(&self, _credentials: &Credentials) -> Result<(), ApiError> {
        self.record("accept_terms");
        self.set_terms(true);
        Ok(())
    }

    async fn profile_completed(&self, _credentials: &Credentials) -> Result<bool, ApiError> {
        self.check_flag("profile_completed", &self.profile).await
    }

    async fn accessible_screens(
        &self,
        _credentials: &Credentials,
    ) -> Result<Vec<Screen>, ApiError> {
        self.record("accessible_screens");
        self.screens.clone().ok_or_else(|| ApiError::Status {
            endpoint: "/pantallas/accesibles".to_string(),
            status: 503,
            message: "catalog unavailable".to_string(),
        })
    }

    async fn logout(&self, _credentials: &Credentials) -> Result<(), ApiError> {
        self.record("logout");
        if self.fail_logout {
            return Err(ApiError::RequestFailed {
                endpoint: "/auth/logout".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}
