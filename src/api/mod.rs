//! Reservation backend API.
//!
//! Every endpoint answers with an [`ApiEnvelope`]. The gate only talks to the
//! backend through the [`RemoteApi`] trait; [`HttpApi`] is the reqwest
//! implementation used by the service.

pub mod envelope;
pub mod http;
pub mod traits;

pub use envelope::ApiEnvelope;
pub use http::HttpApi;
pub use traits::{RemoteApi, bounded};
