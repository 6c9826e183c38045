//! `RemoteApi` trait: the slice of the reservation backend the gate needs.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::gate::Screen;
use crate::session::{Credentials, UserIdentity};

/// Backend endpoints used by the session, onboarding and permission flows.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Exchange an authorization code for credentials.
    async fn exchange_code(&self, code: &str) -> Result<Credentials, ApiError>;

    /// Fetch the identity behind the given credentials.
    async fn current_user(&self, credentials: &Credentials) -> Result<UserIdentity, ApiError>;

    /// Whether the user has accepted the terms of use.
    async fn terms_accepted(&self, credentials: &Credentials) -> Result<bool, ApiError>;

    /// Record terms acceptance.
    async fn accept_terms(&self, credentials: &Credentials) -> Result<(), ApiError>;

    /// Whether the user has completed their profile.
    async fn profile_completed(&self, credentials: &Credentials) -> Result<bool, ApiError>;

    /// The screen catalog used for route gating.
    async fn accessible_screens(&self, credentials: &Credentials)
    -> Result<Vec<Screen>, ApiError>;

    /// Invalidate the credentials server-side.
    async fn logout(&self, credentials: &Credentials) -> Result<(), ApiError>;
}

/// Run a remote call with an upper bound on how long it may take.
pub async fn bounded<T, F>(endpoint: &str, timeout: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout {
            endpoint: endpoint.to_string(),
            timeout,
        }),
    }
}
