//! HTTP layer
//!
//! Axum server with:
//! - JSON envelope for every response
//! - Admin API key guard and fixed-window rate limits
//! - CORS, request tracing, graceful shutdown

pub mod error;
pub mod extractors;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use response::Envelope;
pub use server::{build_router, run_server, AppState, ServerError};
