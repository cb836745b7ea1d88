//! Wayfarer API crate: axum HTTP server and route handlers.
//!
//! Exposes the chat pipeline over `POST /chat`, direct attraction lookups
//! over `GET /attractions`, and a health check.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
