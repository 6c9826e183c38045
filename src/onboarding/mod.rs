//! Onboarding gate: what happens between a successful login and the first
//! screen (terms acceptance, profile completion, the landing decision).

pub mod cache;
pub mod router;
pub mod routes;

pub use cache::ValidationCache;
pub use router::{
    CallbackParams, Destination, LoginFailure, LoginOutcome, OnboardingChecks, OnboardingStatus,
    PostLoginRouter, decide,
};
pub use routes::{GateResponse, OnboardingRouteState, onboarding_routes};
