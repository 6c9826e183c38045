//! Reservas gate: session, onboarding and permission gate for the
//! facility reservation client.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod navigation;
pub mod onboarding;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;
