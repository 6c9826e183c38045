//! The response envelope every backend endpoint answers with.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `{status, message, data, error?, errors?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Field-level validation errors; shape varies per endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl<T> ApiEnvelope<T> {
    /// Wrap `data` in a successful envelope.
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            data: Some(data),
            error: None,
            errors: None,
        }
    }

    /// Build a failed envelope with the given status and error text.
    pub fn failure(status: u16, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status,
            message: error.clone(),
            data: None,
            error: Some(error),
            errors: None,
        }
    }

    /// Whether the backend flagged this response as failed.
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 400
    }

    /// Unwrap the payload, turning backend-reported errors into `ApiError`.
    pub fn into_data(self, endpoint: &str) -> Result<T, ApiError> {
        self.check(endpoint)?;
        self.data.ok_or_else(|| ApiError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: "envelope has no data".to_string(),
        })
    }

    /// Check for backend-reported errors, ignoring the payload.
    pub fn check(&self, endpoint: &str) -> Result<(), ApiError> {
        if !self.is_failure() {
            return Ok(());
        }
        let message = self
            .error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.message.clone());
        Err(ApiError::Rejected {
            endpoint: endpoint.to_string(),
            message,
        })
    }
}
