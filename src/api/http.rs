//! reqwest-backed `RemoteApi` talking JSON envelopes to the backend.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::envelope::ApiEnvelope;
use super::traits::RemoteApi;
use crate::error::ApiError;
use crate::gate::Screen;
use crate::session::{Credentials, StoredToken, UserIdentity};

/// Endpoint paths, relative to the configured base URL.
pub mod endpoints {
    pub const TOKEN: &str = "/auth/token";
    pub const ME: &str = "/auth/me";
    pub const LOGOUT: &str = "/auth/logout";
    pub const TERMS: &str = "/usuarios/terminos";
    pub const PROFILE_COMPLETED: &str = "/usuarios/perfil/completo";
    pub const ACCESSIBLE_SCREENS: &str = "/pantallas/accesibles";
}

/// Payload of the terms check.
#[derive(Debug, serde::Deserialize)]
struct TermsStatus {
    #[serde(alias = "aceptado", alias = "accepted")]
    terms_accepted: bool,
}

/// Payload of the profile check.
#[derive(Debug, serde::Deserialize)]
struct ProfileStatus {
    #[serde(alias = "completo", alias = "completed")]
    profile_completed: bool,
}

/// HTTP client for the reservation backend.
pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let request = self
            .client
            .get(self.url(endpoint))
            .header(reqwest::header::AUTHORIZATION, credentials.bearer());
        self.send(endpoint, request).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        credentials: Option<&Credentials>,
        body: &B,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let mut request = self.client.post(self.url(endpoint)).json(body);
        if let Some(credentials) = credentials {
            request = request.header(reqwest::header::AUTHORIZATION, credentials.bearer());
        }
        self.send(endpoint, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "Backend responded");

        if !status.is_success() {
            // Failed responses usually still carry an envelope with the reason.
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.error.or(Some(env.message)))
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn exchange_code(&self, code: &str) -> Result<Credentials, ApiError> {
        let body = serde_json::json!({ "code": code });
        let token: StoredToken = self
            .post(endpoints::TOKEN, None, &body)
            .await?
            .into_data(endpoints::TOKEN)?;
        Ok(token.into())
    }

    async fn current_user(&self, credentials: &Credentials) -> Result<UserIdentity, ApiError> {
        self.get(endpoints::ME, credentials)
            .await?
            .into_data(endpoints::ME)
    }

    async fn terms_accepted(&self, credentials: &Credentials) -> Result<bool, ApiError> {
        let status: TermsStatus = self
            .get(endpoints::TERMS, credentials)
            .await?
            .into_data(endpoints::TERMS)?;
        Ok(status.terms_accepted)
    }

    async fn accept_terms(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let body = serde_json::json!({ "aceptado": true });
        let envelope: ApiEnvelope<serde_json::Value> =
            self.post(endpoints::TERMS, Some(credentials), &body).await?;
        envelope.check(endpoints::TERMS)
    }

    async fn profile_completed(&self, credentials: &Credentials) -> Result<bool, ApiError> {
        let status: ProfileStatus = self
            .get(endpoints::PROFILE_COMPLETED, credentials)
            .await?
            .into_data(endpoints::PROFILE_COMPLETED)?;
        Ok(status.profile_completed)
    }

    async fn accessible_screens(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Screen>, ApiError> {
        self.get(endpoints::ACCESSIBLE_SCREENS, credentials)
            .await?
            .into_data(endpoints::ACCESSIBLE_SCREENS)
    }

    async fn logout(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let envelope: ApiEnvelope<serde_json::Value> = self
            .post(endpoints::LOGOUT, Some(credentials), &serde_json::json!({}))
            .await?;
        envelope.check(endpoints::LOGOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpApi::new("http://backend/api/");
        assert_eq!(api.url(endpoints::ME), "http://backend/api/auth/me");
    }

    #[test]
    fn check_payloads_accept_spanish_and_english_names() {
        let terms: TermsStatus = serde_json::from_str(r#"{"aceptado": true}"#).unwrap();
        assert!(terms.terms_accepted);
        let profile: ProfileStatus = serde_json::from_str(r#"{"completed": false}"#).unwrap();
        assert!(!profile.profile_completed);
    }
}
