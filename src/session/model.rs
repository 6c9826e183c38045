//! Session and credential models.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a permission-scoped screen.
pub type ScreenId = i64;

/// Tokens obtained from the authorization code exchange.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

/// Persisted form of [`Credentials`], stored under the `TOKEN` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl From<&Credentials> for StoredToken {
    fn from(credentials: &Credentials) -> Self {
        Self {
            access_token: credentials.access_token.expose_secret().to_string(),
            refresh_token: credentials
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        }
    }
}

impl From<StoredToken> for Credentials {
    fn from(token: StoredToken) -> Self {
        Self {
            access_token: SecretString::from(token.access_token),
            refresh_token: token.refresh_token.map(SecretString::from),
        }
    }
}

/// Identity as reported by the backend's "current user" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(alias = "id", alias = "usuarioId")]
    pub user_id: String,
    #[serde(alias = "rol")]
    pub role: String,
    /// Ids of the screens this user may open.
    #[serde(default, alias = "permisos")]
    pub permissions: Vec<ScreenId>,
    #[serde(default, alias = "perfilCompleto")]
    pub profile_completed: bool,
    #[serde(default, alias = "terminosAceptados")]
    pub terms_accepted: bool,
}

/// The authenticated session. Created when credentials are exchanged or
/// restored, dropped on logout.
#[derive(Debug, Clone)]
pub struct Session {
    /// Minted locally each time a session is established.
    pub session_id: Uuid,
    pub user_id: String,
    pub role: String,
    pub permissions: HashSet<ScreenId>,
    pub profile_completed: bool,
    pub terms_accepted: bool,
    pub credentials: Credentials,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: UserIdentity, credentials: Credentials) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: identity.user_id,
            role: identity.role,
            permissions: identity.permissions.into_iter().collect(),
            profile_completed: identity.profile_completed,
            terms_accepted: identity.terms_accepted,
            credentials,
            established_at: Utc::now(),
        }
    }

    /// Replace the identity fields with a fresh fetch, keeping the session id.
    pub fn apply_identity(&mut self, identity: UserIdentity) {
        self.user_id = identity.user_id;
        self.role = identity.role;
        self.permissions = identity.permissions.into_iter().collect();
        self.profile_completed = identity.profile_completed;
        self.terms_accepted = identity.terms_accepted;
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    pub fn can_open(&self, screen: ScreenId) -> bool {
        self.permissions.contains(&screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_accepts_backend_field_names() {
        let identity: UserIdentity = serde_json::from_str(
            r#"{"id": "u-17", "rol": "ESTUDIANTE", "permisos": [3, 9], "perfilCompleto": true}"#,
        )
        .unwrap();
        assert_eq!(identity.user_id, "u-17");
        assert_eq!(identity.role, "ESTUDIANTE");
        assert_eq!(identity.permissions, vec![3, 9]);
        assert!(identity.profile_completed);
        assert!(!identity.terms_accepted);
    }

    #[test]
    fn stored_token_roundtrips_secrets() {
        let credentials = Credentials::new("access").with_refresh_token("refresh");
        let stored = StoredToken::from(&credentials);
        assert_eq!(stored.access_token, "access");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));

        let back = Credentials::from(stored);
        assert_eq!(back.bearer(), "Bearer access");
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let credentials = Credentials::new("super-secret");
        assert!(!format!("{credentials:?}").contains("super-secret"));
    }

    #[test]
    fn apply_identity_keeps_session_id() {
        let identity = UserIdentity {
            user_id: "u1".into(),
            role: "ESTUDIANTE".into(),
            permissions: vec![1],
            profile_completed: false,
            terms_accepted: false,
        };
        let mut session = Session::new(identity.clone(), Credentials::new("t"));
        let id = session.session_id;

        session.apply_identity(UserIdentity {
            permissions: vec![1, 2],
            terms_accepted: true,
            ..identity
        });
        assert_eq!(session.session_id, id);
        assert!(session.can_open(2));
        assert!(session.terms_accepted);
    }
}
