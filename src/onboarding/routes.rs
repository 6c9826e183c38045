//! HTTP surface of the gate: the authentication callback, onboarding
//! completion, logout, and the route check used by the frontend guard.
//!
//! The gate holds a single session, so only the client's own origins may
//! call it. Requests carrying any other `Origin` are refused before they
//! reach a handler; requests without one (same-origin navigations, local
//! tools) pass.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::router::{CallbackParams, PostLoginRouter};
use crate::config::GateConfig;
use crate::error::ApiError;
use crate::gate::{GateDecision, PermissionGate};

/// Shared state for the gate routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub router: Arc<PostLoginRouter>,
    pub gate: Arc<PermissionGate>,
    allowed_origins: Arc<[HeaderValue]>,
}

impl OnboardingRouteState {
    pub fn new(router: Arc<PostLoginRouter>, gate: Arc<PermissionGate>, config: &GateConfig) -> Self {
        let allowed_origins = config
            .allowed_origins
            .iter()
            .filter(|origin| origin.as_str() != "*")
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "Ignoring unusable allowed origin");
                    None
                }
            })
            .collect();
        Self {
            router,
            gate,
            allowed_origins,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnUrlQuery {
    #[serde(rename = "returnUrl", alias = "return_url")]
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    pub path: String,
}

/// Body of `GET /api/gate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GateResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl From<GateDecision> for GateResponse {
    fn from(decision: GateDecision) -> Self {
        match decision {
            GateDecision::Allow { .. } => Self {
                allowed: true,
                redirect: None,
            },
            GateDecision::Deny { redirect } => Self {
                allowed: false,
                redirect: Some(redirect),
            },
        }
    }
}

/// GET /auth/callback?code=&returnUrl=
///
/// Completes the login and redirects (303) to wherever the user belongs.
async fn callback(
    State(state): State<OnboardingRouteState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let outcome = state.router.handle_callback(&params).await;
    Redirect::to(&outcome.path)
}

/// POST /auth/logout
async fn logout(State(state): State<OnboardingRouteState>) -> Redirect {
    let outcome = state.router.logout().await;
    Redirect::to(&outcome.path)
}

/// POST /api/onboarding/terms
async fn accept_terms(
    State(state): State<OnboardingRouteState>,
    Query(query): Query<ReturnUrlQuery>,
) -> Response {
    match state.router.accept_terms(query.return_url.as_deref()).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => api_error_response(e),
    }
}

/// POST /api/onboarding/profile
async fn complete_profile(
    State(state): State<OnboardingRouteState>,
    Query(query): Query<ReturnUrlQuery>,
) -> Response {
    match state
        .router
        .complete_profile(query.return_url.as_deref())
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => api_error_response(e),
    }
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.router.status().await)
}

/// GET /api/gate?path=
async fn check_path(
    State(state): State<OnboardingRouteState>,
    Query(query): Query<GateQuery>,
) -> Json<GateResponse> {
    Json(state.gate.check(&query.path).await.into())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Refuse requests from origins other than the client's.
async fn require_known_origin(
    State(state): State<OnboardingRouteState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN)
        && !state.allowed_origins.contains(origin)
    {
        warn!(origin = ?origin, path = %request.uri().path(), "Refused request from unknown origin");
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "origin not allowed" })),
        )
            .into_response();
    }
    next.run(request).await
}

fn api_error_response(error: ApiError) -> Response {
    let status = match &error {
        ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!(error = %error, status = status.as_u16(), "Onboarding action failed");
    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}

/// Build the gate routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.allowed_origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/auth/callback", get(callback))
        .route("/auth/logout", post(logout))
        .route("/api/onboarding/terms", post(accept_terms))
        .route("/api/onboarding/profile", post(complete_profile))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/gate", get(check_path))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_known_origin,
        ))
        .layer(cors)
        .with_state(state)
}
